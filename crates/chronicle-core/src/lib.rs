// crates/chronicle-core/src/lib.rs
//
// chronicle-core: identity, STAMP, and chronology types for the Chronicle
// terminology store.
//
// This is the leaf crate that every other crate in the workspace depends on.
// It defines the versioned entity model, the error taxonomy, the well-known
// bootstrap concepts, and the trait seams (identity service, entity registry,
// stated view) that storage backends implement and consumers read through.

pub mod chronology;
pub mod entity;
pub mod error;
pub mod identity;
pub mod time;
pub mod traits;
pub mod version;
pub mod view;
pub mod well_known;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use chronicle_core::Chronology;`

// Identity types
pub use identity::{uuid_for_sctid, Nid, PublicId};

// Chronology and version types
pub use chronology::Chronology;
pub use entity::{ConceptChronology, Entity, PatternChronology, StampChronology};
pub use version::{
    ConceptVersion, FieldDataType, FieldDefinition, FieldValue, PatternVersion, StampVersion,
    VersionData, VersionRecord,
};

// Time codec
pub use time::{parse_effective_time, PREMUNDANE_TIME, UNCOMMITTED_TIME};

// Bootstrap concepts
pub use well_known::{WellKnown, SNOMED_NAMESPACE};

// Error type
pub use error::ChronicleError;

// Traits and read view
pub use traits::{EntityRegistry, IdentityService};
pub use view::{RegistrySnapshot, StatedView};
