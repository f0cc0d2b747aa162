// crates/chronicle-core/src/traits.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::entity::Entity;
use crate::error::ChronicleError;
use crate::identity::{Nid, PublicId};
use crate::version::{StampVersion, VersionRecord};
use crate::view::RegistrySnapshot;

/// Bidirectional mapping between UUID-set identities and nids.
///
/// Implemented by chronicle-store (`InMemoryIdentityService`).
pub trait IdentityService: Send + Sync {
    /// Return the nid of the identity containing any of `uuids`, allocating a
    /// fresh one if none is known. Concurrent callers presenting the same
    /// identity observe the same nid. Unseen aliases widen the identity.
    fn nid_for(&self, uuids: &[Uuid]) -> Result<Nid, ChronicleError>;

    /// Lookup without allocating.
    fn nid_if_known(&self, uuids: &[Uuid]) -> Option<Nid>;

    /// Reverse lookup. Fails with `UnknownIdentity` for a never-allocated nid.
    fn uuids_for(&self, nid: Nid) -> Result<PublicId, ChronicleError>;

    /// Number of allocated identities.
    fn identity_count(&self) -> usize;

    fn nid_for_public_id(&self, public_id: &PublicId) -> Result<Nid, ChronicleError> {
        self.nid_for(public_id.uuids())
    }
}

/// Shared nid -> chronology store; the single point of truth for readers.
///
/// Implemented by chronicle-store (`InMemoryRegistry`).
pub trait EntityRegistry: IdentityService {
    /// The currently published chronology for `nid`, if any.
    fn get(&self, nid: Nid) -> Option<Arc<Entity>>;

    /// Publish or replace a whole chronology under its own nid.
    ///
    /// Every version's stamp must resolve to a stamp in the registry
    /// (a stamp chronology's own versions resolve to itself).
    fn put(&self, entity: Entity) -> Result<Arc<Entity>, ChronicleError>;

    /// Append one version, creating the chronology on first sight.
    ///
    /// The owning identity must already be allocated. The version is placed
    /// by stamp time (ties after existing versions) and becomes visible
    /// atomically with the rest of the chronology. Appending a version equal
    /// to an existing one leaves the chronology unchanged.
    fn append(&self, version: VersionRecord) -> Result<Arc<Entity>, ChronicleError>;

    /// Point-in-time copy for read-only consumers.
    fn snapshot(&self) -> RegistrySnapshot;

    /// Number of published chronologies.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latest version of the stamp chronology `nid`, if published.
    fn stamp(&self, nid: Nid) -> Option<StampVersion> {
        self.get(nid)
            .and_then(|entity| entity.as_stamp().map(|stamp| stamp.latest().clone()))
    }
}
