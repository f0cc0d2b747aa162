// crates/chronicle-core/src/error.rs

use thiserror::Error;
use uuid::Uuid;

use crate::identity::Nid;

/// Store-wide error types for Chronicle.
#[derive(Debug, Error)]
pub enum ChronicleError {
    /// A release row had the wrong column count or an unparsable field.
    /// The row is rejected as a whole; ingestion continues with the next row.
    #[error("Malformed row: {0}")]
    MalformedRow(String),

    /// A status/author/module/path reference has never been seeded or published.
    #[error("Unresolved reference concept {role}: {uuids:?}")]
    UnresolvedReferenceConcept { role: &'static str, uuids: Vec<Uuid> },

    /// A version references a stamp nid that is not present in the registry.
    /// Indicates a pipeline ordering bug.
    #[error("Dangling stamp reference: chronology {chronology} -> stamp {stamp}")]
    DanglingStampReference { chronology: Nid, stamp: Nid },

    /// Reverse lookup on a nid that was never allocated.
    #[error("Unknown identity: {0}")]
    UnknownIdentity(Nid),

    /// An identity must carry at least one UUID.
    #[error("Empty identity: at least one UUID is required")]
    EmptyIdentity,

    /// Two STAMP tuples for the same stamp identity share a time but differ otherwise.
    #[error("Stamp conflict: stamp {stamp} already has a different version at time {time}")]
    StampConflict { stamp: Nid, time: i64 },

    /// A version was appended to a chronology of another kind.
    #[error("Kind mismatch for {nid}: expected {expected}, found {found}")]
    KindMismatch {
        nid: Nid,
        expected: &'static str,
        found: &'static str,
    },

    /// A version whose back-reference names another chronology.
    #[error("Foreign version: chronology {chronology} was given a version owned by {owner}")]
    ForeignVersion { chronology: Nid, owner: Nid },

    /// A chronology whose versions are not in ascending stamp-time order.
    #[error("Unordered versions in {nid}: version {index} precedes its predecessor")]
    UnorderedVersions { nid: Nid, index: usize },

    /// A chronology carrying a UUID that is not an alias of its nid.
    #[error("Identity mismatch for {nid}: {uuid} is not one of its UUIDs")]
    IdentityMismatch { nid: Nid, uuid: Uuid },

    /// A chronology must never be published without versions.
    #[error("Empty chronology: {0}")]
    EmptyChronology(Nid),

    /// Field values do not match a pattern's declared field definitions.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem error while reading release or starter data.
    #[error("I/O error: {0}")]
    Io(String),
}

impl ChronicleError {
    /// Whether this error rejects a single row without poisoning the batch.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            ChronicleError::MalformedRow(_)
                | ChronicleError::UnresolvedReferenceConcept { .. }
                | ChronicleError::StampConflict { .. }
                | ChronicleError::KindMismatch { .. }
                | ChronicleError::EmptyIdentity
        )
    }
}

impl From<serde_json::Error> for ChronicleError {
    fn from(e: serde_json::Error) -> Self {
        ChronicleError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for ChronicleError {
    fn from(e: std::io::Error) -> Self {
        ChronicleError::Io(e.to_string())
    }
}
