// crates/chronicle-store/src/lib.rs
//
// chronicle-store: concurrent in-memory storage for Chronicle.
//
// Provides the sharded identity service (UUID set <-> nid), the entity
// registry (nid -> chronology) with atomic per-nid appends, the STAMP
// builder, and the scoped session that seeds bootstrap concepts and hands an
// isolated registry to ingestion and readers.

pub mod identity;
pub mod registry;
pub mod session;
pub mod stamp;

// Re-export key types for ergonomic access from downstream crates.
pub use identity::InMemoryIdentityService;
pub use registry::{publish_first_version, InMemoryRegistry};
pub use session::{seed_bootstrap, Session, SessionConfig, SessionSummary};
pub use stamp::{build_stamp, resolve_reference, ResolvedStamp, StampRequest};
