// crates/chronicle-ingest/src/transform.rs
//
// Row -> chronology transforms. Each transform parses and resolves every
// reference first; only a fully valid row reaches the registry, so a rejected
// row leaves no version behind.

use tracing::debug;

use chronicle_core::entity::{ConceptChronology, StampChronology};
use chronicle_core::error::ChronicleError;
use chronicle_core::traits::{EntityRegistry, IdentityService};
use chronicle_core::version::{ConceptVersion, VersionRecord};
use chronicle_store::stamp::publish_resolved_stamp;

use crate::context::IngestContext;
use crate::rf2::{ReleaseSchema, Rf2Row};

/// Build (or reuse) the stamp chronology for one concept-file row.
pub fn create_stamp_chronology<R: EntityRegistry + ?Sized>(
    registry: &R,
    ctx: &IngestContext,
    line: &str,
) -> Result<StampChronology, ChronicleError> {
    let row = Rf2Row::parse(line, &ReleaseSchema::CONCEPT)?;
    stamp_for_row(registry, ctx, &row)
}

/// Stamp for an already-parsed row.
pub fn stamp_for_row<R: EntityRegistry + ?Sized>(
    registry: &R,
    ctx: &IngestContext,
    row: &Rf2Row,
) -> Result<StampChronology, ChronicleError> {
    let request = ctx.stamp_request(row);
    let resolved = request.resolve(registry)?;
    publish_resolved_stamp(registry, &request.identity, resolved)
}

/// Append the version described by one concept-file row, creating the
/// concept chronology on first sight of its identity.
pub fn create_concept_chronology<R: EntityRegistry + ?Sized>(
    registry: &R,
    ctx: &IngestContext,
    line: &str,
) -> Result<ConceptChronology, ChronicleError> {
    let row = Rf2Row::parse(line, &ReleaseSchema::CONCEPT)?;
    concept_for_row(registry, ctx, &row)
}

/// Concept for an already-parsed row.
pub fn concept_for_row<R: EntityRegistry + ?Sized>(
    registry: &R,
    ctx: &IngestContext,
    row: &Rf2Row,
) -> Result<ConceptChronology, ChronicleError> {
    let request = ctx.stamp_request(row);
    // Resolve before any write; an unresolved module rejects the row cleanly.
    let resolved = request.resolve(registry)?;
    let concept_uuid = ctx.concept_uuid(row);
    if let Some(existing) = registry
        .nid_if_known(&[concept_uuid])
        .and_then(|nid| registry.get(nid))
    {
        if existing.as_concept().is_none() {
            return Err(ChronicleError::KindMismatch {
                nid: existing.nid(),
                expected: "concept",
                found: existing.kind(),
            });
        }
    }

    let stamp = publish_resolved_stamp(registry, &request.identity, resolved)?;
    let concept_nid = registry.nid_for(&[concept_uuid])?;
    let entity = registry.append(VersionRecord::Concept(ConceptVersion {
        chronology_nid: concept_nid,
        stamp_nid: stamp.nid(),
    }))?;
    debug!("Concept {} -> {} ({} versions)", row.id, concept_nid, entity.version_count());

    entity
        .as_concept()
        .cloned()
        .ok_or(ChronicleError::KindMismatch {
            nid: concept_nid,
            expected: "concept",
            found: entity.kind(),
        })
}
