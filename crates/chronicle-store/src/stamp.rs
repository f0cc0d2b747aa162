// crates/chronicle-store/src/stamp.rs
//
// STAMP construction: resolve the status/author/module/path concepts, resolve
// or allocate the stamp's own nid, and publish the tuple through the registry.
// Dedup of identical tuples and same-time conflicts are enforced atomically
// by the registry's append.

use uuid::Uuid;

use chronicle_core::entity::StampChronology;
use chronicle_core::error::ChronicleError;
use chronicle_core::identity::{Nid, PublicId};
use chronicle_core::traits::{EntityRegistry, IdentityService};
use chronicle_core::version::{StampVersion, VersionRecord};

/// Everything needed to build one stamp version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampRequest {
    pub status: PublicId,
    pub time: i64,
    pub author: PublicId,
    pub module: PublicId,
    pub path: PublicId,
    /// The stamp's own identity.
    pub identity: PublicId,
}

/// STAMP concepts resolved to nids, ready to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedStamp {
    pub status_nid: Nid,
    pub time: i64,
    pub author_nid: Nid,
    pub module_nid: Nid,
    pub path_nid: Nid,
}

impl ResolvedStamp {
    pub fn into_version(self, stamp_nid: Nid) -> StampVersion {
        StampVersion {
            chronology_nid: stamp_nid,
            status_nid: self.status_nid,
            time: self.time,
            author_nid: self.author_nid,
            module_nid: self.module_nid,
            path_nid: self.path_nid,
        }
    }
}

/// Resolve a referenced concept without allocating.
///
/// The reference must name a published concept chronology. An identity that
/// was only allocated, or that names a pattern or stamp, is
/// `UnresolvedReferenceConcept`.
pub fn resolve_reference<R: EntityRegistry + ?Sized>(
    registry: &R,
    role: &'static str,
    reference: &[Uuid],
) -> Result<Nid, ChronicleError> {
    registry
        .nid_if_known(reference)
        .filter(|nid| {
            registry
                .get(*nid)
                .is_some_and(|entity| entity.as_concept().is_some())
        })
        .ok_or_else(|| ChronicleError::UnresolvedReferenceConcept {
            role,
            uuids: reference.to_vec(),
        })
}

impl StampRequest {
    /// Resolve status/author/module/path. Touches no shared state beyond lookups.
    pub fn resolve<R: EntityRegistry + ?Sized>(
        &self,
        registry: &R,
    ) -> Result<ResolvedStamp, ChronicleError> {
        Ok(ResolvedStamp {
            status_nid: resolve_reference(registry, "status", self.status.uuids())?,
            time: self.time,
            author_nid: resolve_reference(registry, "author", self.author.uuids())?,
            module_nid: resolve_reference(registry, "module", self.module.uuids())?,
            path_nid: resolve_reference(registry, "path", self.path.uuids())?,
        })
    }
}

/// Build (or extend) the stamp chronology for `request.identity`.
///
/// The first request for an identity creates a one-version chronology; an
/// identical tuple returns the existing chronology unchanged; a different
/// tuple at a new time appends a version; a different tuple at an existing
/// time fails with `StampConflict`.
pub fn build_stamp<R: EntityRegistry + ?Sized>(
    registry: &R,
    request: &StampRequest,
) -> Result<StampChronology, ChronicleError> {
    let resolved = request.resolve(registry)?;
    publish_resolved_stamp(registry, &request.identity, resolved)
}

/// Publish an already-resolved tuple under `identity`.
pub fn publish_resolved_stamp<R: EntityRegistry + ?Sized>(
    registry: &R,
    identity: &PublicId,
    resolved: ResolvedStamp,
) -> Result<StampChronology, ChronicleError> {
    let stamp_nid = registry.nid_for_public_id(identity)?;
    let entity = registry.append(VersionRecord::Stamp(resolved.into_version(stamp_nid)))?;
    entity
        .as_stamp()
        .cloned()
        .ok_or(ChronicleError::KindMismatch {
            nid: stamp_nid,
            expected: "stamp",
            found: entity.kind(),
        })
}
