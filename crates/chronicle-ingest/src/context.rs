// crates/chronicle-ingest/src/context.rs
//
// Ingestion context: the fixed provenance a release is loaded under, and the
// UUID derivations that turn SCTIDs and STAMP tuples into identities.

use uuid::Uuid;

use chronicle_core::identity::{uuid_for_sctid, PublicId};
use chronicle_core::well_known::{WellKnown, SNOMED_NAMESPACE};
use chronicle_store::stamp::StampRequest;

use crate::rf2::Rf2Row;

/// Provenance applied to every row of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestContext {
    /// Namespace for SCTID- and STAMP-derived UUIDs.
    pub namespace: Uuid,
    pub author: Uuid,
    pub path: Uuid,
    /// When set, every stamp uses this module instead of the row's `moduleId`.
    pub module_override: Option<Uuid>,
}

impl Default for IngestContext {
    fn default() -> Self {
        Self {
            namespace: SNOMED_NAMESPACE,
            author: WellKnown::TerminologyAuthor.uuid(),
            path: WellKnown::DevelopmentPath.uuid(),
            module_override: None,
        }
    }
}

impl IngestContext {
    /// Identity of the concept a row describes.
    pub fn concept_uuid(&self, row: &Rf2Row) -> Uuid {
        uuid_for_sctid(&self.namespace, &row.id)
    }

    /// Module concept a row's stamp is recorded under.
    pub fn module_uuid(&self, row: &Rf2Row) -> Uuid {
        self.module_override
            .unwrap_or_else(|| uuid_for_sctid(&self.namespace, &row.module_id))
    }

    pub fn status_uuid(&self, row: &Rf2Row) -> Uuid {
        WellKnown::status_for_active(row.active).uuid()
    }

    /// Identity of a row's stamp, derived from its full STAMP tuple so every
    /// row sharing status, time, author, module and path shares one stamp.
    pub fn stamp_uuid(&self, row: &Rf2Row) -> Uuid {
        let seed = format!(
            "{}|{}|{}|{}|{}",
            self.status_uuid(row),
            row.effective_date,
            self.author,
            self.module_uuid(row),
            self.path
        );
        Uuid::new_v5(&self.namespace, seed.as_bytes())
    }

    pub fn stamp_request(&self, row: &Rf2Row) -> StampRequest {
        StampRequest {
            status: self.status_uuid(row).into(),
            time: row.time,
            author: self.author.into(),
            module: self.module_uuid(row).into(),
            path: self.path.into(),
            identity: PublicId::single(self.stamp_uuid(row)),
        }
    }
}
