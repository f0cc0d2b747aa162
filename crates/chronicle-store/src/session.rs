// crates/chronicle-store/src/session.rs
//
// Scoped session: an isolated identity service + registry with bootstrap
// concepts seeded, handed to every component explicitly.
//
// Lifecycle: `Session::open` -> use `registry()` -> `close()`. Each session
// owns its own tables, so parallel test cases and concurrent ingestion runs
// never share mutable state.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use chronicle_core::error::ChronicleError;
use chronicle_core::identity::{Nid, PublicId};
use chronicle_core::time::PREMUNDANE_TIME;
use chronicle_core::traits::{EntityRegistry, IdentityService};
use chronicle_core::version::{ConceptVersion, VersionRecord};
use chronicle_core::well_known::{WellKnown, WELL_KNOWN_NAMESPACE};

use crate::identity::{InMemoryIdentityService, DEFAULT_SHARD_AMOUNT};
use crate::registry::InMemoryRegistry;
use crate::stamp::{publish_resolved_stamp, ResolvedStamp};

/// Session construction options.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Shard count for the identity and entity maps (rounded to a power of two).
    pub shard_amount: usize,
    /// Additional concepts published alongside the well-known ones
    /// (e.g. release module concepts).
    pub bootstrap_concepts: Vec<Uuid>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shard_amount: DEFAULT_SHARD_AMOUNT,
            bootstrap_concepts: Vec::new(),
        }
    }
}

/// Counts reported when a session closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub identities: usize,
    pub concepts: usize,
    pub patterns: usize,
    pub stamps: usize,
    pub elapsed_ms: u128,
}

/// An open, isolated store.
#[derive(Debug)]
pub struct Session {
    registry: Arc<InMemoryRegistry>,
    bootstrap_stamp: Nid,
    opened_at: Instant,
}

impl Session {
    /// Open a session with a fresh in-memory identity service.
    pub fn open(config: SessionConfig) -> Result<Self, ChronicleError> {
        let identities = Arc::new(InMemoryIdentityService::with_shard_amount(config.shard_amount));
        Self::open_with_identity_service(config, identities)
    }

    /// Open a session whose registry allocates nids through `identities`.
    pub fn open_with_identity_service(
        config: SessionConfig,
        identities: Arc<dyn IdentityService>,
    ) -> Result<Self, ChronicleError> {
        let registry = Arc::new(InMemoryRegistry::with_identity_service(
            identities,
            config.shard_amount,
        ));
        let bootstrap_stamp = seed_bootstrap(&*registry, &config.bootstrap_concepts)?;
        info!(
            "Session opened: {} identities, {} chronologies seeded",
            registry.identity_count(),
            registry.len()
        );
        Ok(Self {
            registry,
            bootstrap_stamp,
            opened_at: Instant::now(),
        })
    }

    /// Shared handle to this session's registry.
    pub fn registry(&self) -> Arc<InMemoryRegistry> {
        Arc::clone(&self.registry)
    }

    /// Nid of the stamp that authorizes every bootstrap concept.
    pub fn bootstrap_stamp(&self) -> Nid {
        self.bootstrap_stamp
    }

    /// Nid of a well-known concept. Always allocated for an open session.
    pub fn nid_of(&self, concept: WellKnown) -> Result<Nid, ChronicleError> {
        self.registry.nid_for(&[concept.uuid()])
    }

    /// Close the session and report what it holds.
    pub fn close(self) -> SessionSummary {
        let (concepts, patterns, stamps) = self.registry.snapshot().counts();
        let summary = SessionSummary {
            identities: self.registry.identity_count(),
            concepts,
            patterns,
            stamps,
            elapsed_ms: self.opened_at.elapsed().as_millis(),
        };
        info!(
            "Session closed: {} identities, {} concepts, {} patterns, {} stamps ({} ms)",
            summary.identities, summary.concepts, summary.patterns, summary.stamps, summary.elapsed_ms
        );
        summary
    }
}

/// Identity of the stamp authorizing bootstrap concepts.
pub fn bootstrap_stamp_uuid() -> Uuid {
    Uuid::new_v5(&WELL_KNOWN_NAMESPACE, b"Bootstrap stamp")
}

/// Seed every well-known identity, publish the bootstrap stamp, and publish
/// the well-known (and `extra`) concepts under it. Pattern identities are
/// allocated but left for pattern data to publish.
///
/// The bootstrap stamp refers to concepts it is itself publishing, so its
/// tuple is assembled from allocated nids rather than resolved references.
///
/// Returns the bootstrap stamp's nid. Safe to call more than once.
pub fn seed_bootstrap(
    registry: &dyn EntityRegistry,
    extra: &[Uuid],
) -> Result<Nid, ChronicleError> {
    for concept in WellKnown::ALL {
        registry.nid_for(&[concept.uuid()])?;
    }

    let nid_of = |concept: WellKnown| registry.nid_for(&[concept.uuid()]);
    let stamp = publish_resolved_stamp(
        registry,
        &PublicId::single(bootstrap_stamp_uuid()),
        ResolvedStamp {
            status_nid: nid_of(WellKnown::Active)?,
            time: PREMUNDANE_TIME,
            author_nid: nid_of(WellKnown::StarterDataAuthor)?,
            module_nid: nid_of(WellKnown::StarterDataModule)?,
            path_nid: nid_of(WellKnown::DevelopmentPath)?,
        },
    )?;
    let stamp_nid = stamp.nid();

    let concepts = WellKnown::ALL
        .into_iter()
        .filter(|wk| !matches!(wk, WellKnown::StatedPattern | WellKnown::InferredPattern))
        .map(WellKnown::uuid)
        .chain(extra.iter().copied());
    for uuid in concepts {
        let nid = registry.nid_for(&[uuid])?;
        registry.append(VersionRecord::Concept(ConceptVersion {
            chronology_nid: nid,
            stamp_nid,
        }))?;
    }
    Ok(stamp_nid)
}
