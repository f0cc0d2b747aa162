// crates/chronicle-store/src/identity.rs
//
// Concurrent UUID-set <-> nid mapping.
//
// Two sharded maps hold the bijection. Lookups are lock-free reads of the
// forward map. Writes to the forward map happen only under the stripe lock
// of the UUID being written: allocation takes the stripes of every presented
// UUID (in ascending stripe order) and re-checks before handing out a nid, so
// callers presenting overlapping UUID sets serialize and observe one nid,
// while identities on other stripes proceed in parallel.
//
// Lock order: stripes ascending, then map entries. Widening holds one stripe
// at a time.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use chronicle_core::error::ChronicleError;
use chronicle_core::identity::{Nid, PublicId};
use chronicle_core::traits::IdentityService;

/// Default shard count for the concurrent maps.
pub const DEFAULT_SHARD_AMOUNT: usize = 64;

/// Append-only identity table implementing `IdentityService`.
#[derive(Debug)]
pub struct InMemoryIdentityService {
    uuid_to_nid: DashMap<Uuid, Nid>,
    nid_to_uuids: DashMap<Nid, PublicId>,
    /// Writer stripes for `uuid_to_nid`, indexed by `stripe_of`.
    stripes: Vec<Mutex<()>>,
    /// Next nid to hand out. Starts at 1 and only grows.
    next_nid: AtomicU32,
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self::with_shard_amount(DEFAULT_SHARD_AMOUNT)
    }

    /// `shard_amount` is rounded up to a power of two, minimum 2.
    pub fn with_shard_amount(shard_amount: usize) -> Self {
        let shards = normalize_shard_amount(shard_amount);
        Self {
            uuid_to_nid: DashMap::with_shard_amount(shards),
            nid_to_uuids: DashMap::with_shard_amount(shards),
            stripes: (0..shards).map(|_| Mutex::new(())).collect(),
            next_nid: AtomicU32::new(1),
        }
    }

    fn stripe_of(&self, uuid: &Uuid) -> usize {
        (uuid.as_u128() as usize) & (self.stripes.len() - 1)
    }

    /// The guards hold no data, so a poisoned stripe is still usable.
    fn lock_stripe(&self, index: usize) -> MutexGuard<'_, ()> {
        self.stripes[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the stripes of every UUID in `uuids`, ascending and deduplicated.
    fn lock_stripes(&self, uuids: &[Uuid]) -> Vec<MutexGuard<'_, ()>> {
        let mut indices: Vec<usize> = uuids.iter().map(|u| self.stripe_of(u)).collect();
        indices.sort_unstable();
        indices.dedup();
        indices.into_iter().map(|i| self.lock_stripe(i)).collect()
    }

    /// Attach unseen aliases in `uuids` to `nid`.
    ///
    /// An alias already owned by another nid is left where it is.
    fn widen(&self, nid: Nid, uuids: &[Uuid]) {
        for uuid in uuids {
            let owner = match self.uuid_to_nid.get(uuid) {
                Some(owner) => *owner,
                None => {
                    let _stripe = self.lock_stripe(self.stripe_of(uuid));
                    *self.uuid_to_nid.entry(*uuid).or_insert(nid)
                }
            };
            if owner != nid {
                warn!(
                    "UUID {} already belongs to {}; not merging into {}",
                    uuid, owner, nid
                );
                continue;
            }
            if let Some(mut public_id) = self.nid_to_uuids.get_mut(&nid) {
                if public_id.widen(*uuid) {
                    debug!("Widened {} with alias {}", nid, uuid);
                }
            }
        }
    }
}

impl Default for InMemoryIdentityService {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityService for InMemoryIdentityService {
    fn nid_for(&self, uuids: &[Uuid]) -> Result<Nid, ChronicleError> {
        let public_id = PublicId::new(uuids)?;

        if let Some(nid) = self.nid_if_known(uuids) {
            self.widen(nid, uuids);
            return Ok(nid);
        }

        let nid = {
            let _stripes = self.lock_stripes(public_id.uuids());
            // Any allocator touching one of these UUIDs holds its stripe, so
            // a miss here cannot race another allocation of the same term.
            match self.nid_if_known(uuids) {
                Some(nid) => nid,
                None => {
                    let nid = Nid::new(self.next_nid.fetch_add(1, Ordering::SeqCst));
                    // Reverse mapping first: once a forward entry is visible
                    // the nid must already resolve.
                    self.nid_to_uuids.insert(nid, public_id.clone());
                    for uuid in public_id.uuids() {
                        self.uuid_to_nid.insert(*uuid, nid);
                    }
                    debug!("Allocated {} for {}", nid, public_id);
                    return Ok(nid);
                }
            }
        };

        self.widen(nid, uuids);
        Ok(nid)
    }

    fn nid_if_known(&self, uuids: &[Uuid]) -> Option<Nid> {
        uuids
            .iter()
            .find_map(|uuid| self.uuid_to_nid.get(uuid).map(|nid| *nid))
    }

    fn uuids_for(&self, nid: Nid) -> Result<PublicId, ChronicleError> {
        self.nid_to_uuids
            .get(&nid)
            .map(|public_id| public_id.clone())
            .ok_or(ChronicleError::UnknownIdentity(nid))
    }

    fn identity_count(&self) -> usize {
        self.nid_to_uuids.len()
    }
}

/// DashMap requires a power-of-two shard count greater than one.
pub(crate) fn normalize_shard_amount(requested: usize) -> usize {
    requested.max(2).next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_same_uuid_same_nid() {
        let ids = InMemoryIdentityService::new();
        let u = Uuid::new_v4();
        let a = ids.nid_for(&[u]).unwrap();
        let b = ids.nid_for(&[u]).unwrap();
        assert_eq!(a, b);
        assert_eq!(ids.identity_count(), 1);
    }

    #[test]
    fn test_allocation_is_dense_and_monotonic() {
        let ids = InMemoryIdentityService::new();
        let nids: Vec<Nid> = (0..5)
            .map(|_| ids.nid_for(&[Uuid::new_v4()]).unwrap())
            .collect();
        assert_eq!(
            nids,
            (1..=5).map(Nid::new).collect::<Vec<_>>(),
            "nids must be allocated densely from 1"
        );
    }

    #[test]
    fn test_empty_identity_rejected() {
        let ids = InMemoryIdentityService::new();
        assert!(matches!(ids.nid_for(&[]), Err(ChronicleError::EmptyIdentity)));
        assert_eq!(ids.identity_count(), 0);
    }

    #[test]
    fn test_alias_widening_keeps_nid() {
        let ids = InMemoryIdentityService::new();
        let primary = Uuid::new_v4();
        let alias = Uuid::new_v4();
        let nid = ids.nid_for(&[primary]).unwrap();
        assert_eq!(ids.nid_for(&[alias, primary]).unwrap(), nid);
        assert_eq!(ids.nid_for(&[alias]).unwrap(), nid);
        let public_id = ids.uuids_for(nid).unwrap();
        assert_eq!(public_id.primary(), primary);
        assert!(public_id.contains(&alias));
    }

    #[test]
    fn test_alias_owned_elsewhere_is_not_reassigned() {
        let ids = InMemoryIdentityService::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let nid_a = ids.nid_for(&[a]).unwrap();
        let nid_b = ids.nid_for(&[b]).unwrap();
        // Presenting both resolves to the first known one; b stays with nid_b.
        assert_eq!(ids.nid_for(&[a, b]).unwrap(), nid_a);
        assert_eq!(ids.nid_if_known(&[b]), Some(nid_b));
        assert!(!ids.uuids_for(nid_a).unwrap().contains(&b));
    }

    #[test]
    fn test_unknown_nid_fails() {
        let ids = InMemoryIdentityService::new();
        assert!(matches!(
            ids.uuids_for(Nid::new(77)),
            Err(ChronicleError::UnknownIdentity(n)) if n == Nid::new(77)
        ));
    }

    #[test]
    fn test_concurrent_same_identity_allocates_once() {
        let ids = Arc::new(InMemoryIdentityService::with_shard_amount(8));
        let u = Uuid::new_v4();
        let nids: HashSet<Nid> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let ids = Arc::clone(&ids);
                    scope.spawn(move || ids.nid_for(&[u]).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(nids.len(), 1);
        assert_eq!(ids.identity_count(), 1);
    }

    #[test]
    fn test_concurrent_overlapping_aliases_share_one_nid() {
        for _ in 0..200 {
            let ids = InMemoryIdentityService::with_shard_amount(4);
            let a = Uuid::new_v4();
            let b = Uuid::new_v4();
            let barrier = Barrier::new(2);
            let (with_alias, alias_only) = std::thread::scope(|scope| {
                let first = scope.spawn(|| {
                    barrier.wait();
                    ids.nid_for(&[a, b]).unwrap()
                });
                let second = scope.spawn(|| {
                    barrier.wait();
                    ids.nid_for(&[b]).unwrap()
                });
                (first.join().unwrap(), second.join().unwrap())
            });
            assert_eq!(with_alias, alias_only);
            assert_eq!(ids.identity_count(), 1);
            assert_eq!(ids.nid_if_known(&[a]), Some(with_alias));
        }
    }

    #[test]
    fn test_new_identity_records_every_uuid() {
        let ids = InMemoryIdentityService::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let nid = ids.nid_for(&[a, b]).unwrap();
        assert_eq!(ids.nid_if_known(&[b]), Some(nid));
        assert_eq!(ids.uuids_for(nid).unwrap().uuids(), &[a, b]);
    }

    #[test]
    fn test_normalize_shard_amount() {
        assert_eq!(normalize_shard_amount(0), 2);
        assert_eq!(normalize_shard_amount(3), 4);
        assert_eq!(normalize_shard_amount(64), 64);
    }
}
