// crates/chronicle-store/src/registry.rs
//
// Concurrent nid -> chronology registry implementing `EntityRegistry`.
//
// Published chronologies are immutable `Arc<Entity>` values. An append builds
// the successor chronology off-lock (resolving stamp times through the
// registry), then swaps it in under the target nid's shard entry only if the
// entry still holds the value the successor was built from. A lost race
// simply rebuilds from the newer value. Readers therefore see either the old
// or the new chronology, never a half-applied append, and appends to
// different nids never contend with each other.
//
// Every swap holds the publish gate shared; `snapshot` holds it exclusively
// for the duration of the copy, so a snapshot is a single point in time: a
// version is never copied without the stamp it was appended against.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};
use uuid::Uuid;

use chronicle_core::entity::Entity;
use chronicle_core::error::ChronicleError;
use chronicle_core::identity::{Nid, PublicId};
use chronicle_core::time::UNCOMMITTED_TIME;
use chronicle_core::traits::{EntityRegistry, IdentityService};
use chronicle_core::version::{VersionData, VersionRecord};
use chronicle_core::view::RegistrySnapshot;
use chronicle_core::well_known::WellKnown;

use crate::identity::{normalize_shard_amount, InMemoryIdentityService, DEFAULT_SHARD_AMOUNT};

/// In-memory entity registry backed by an injectable identity service.
pub struct InMemoryRegistry {
    identities: Arc<dyn IdentityService>,
    entities: DashMap<Nid, Arc<Entity>>,
    publish_gate: RwLock<()>,
}

impl std::fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRegistry")
            .field("identities", &self.identities.identity_count())
            .field("entities", &self.entities.len())
            .finish()
    }
}

impl InMemoryRegistry {
    /// Create a registry with its own in-memory identity service.
    pub fn new() -> Self {
        Self::with_shard_amount(DEFAULT_SHARD_AMOUNT)
    }

    pub fn with_shard_amount(shard_amount: usize) -> Self {
        Self::with_identity_service(
            Arc::new(InMemoryIdentityService::with_shard_amount(shard_amount)),
            shard_amount,
        )
    }

    /// Create a registry that allocates nids through `identities`.
    pub fn with_identity_service(identities: Arc<dyn IdentityService>, shard_amount: usize) -> Self {
        Self {
            identities,
            entities: DashMap::with_shard_amount(normalize_shard_amount(shard_amount)),
            publish_gate: RwLock::new(()),
        }
    }

    /// Shared side of the publish gate, held around every map write.
    fn publishing(&self) -> RwLockReadGuard<'_, ()> {
        self.publish_gate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the value at `nid` only if it is still `seen`.
    fn swap_if_unchanged(&self, nid: Nid, seen: Option<&Arc<Entity>>, next: &Arc<Entity>) -> bool {
        let _gate = self.publishing();
        match (self.entities.entry(nid), seen) {
            (Entry::Vacant(entry), None) => {
                entry.insert(Arc::clone(next));
                true
            }
            (Entry::Occupied(mut entry), Some(seen)) if Arc::ptr_eq(seen, entry.get()) => {
                entry.insert(Arc::clone(next));
                true
            }
            _ => false,
        }
    }

    /// Bring a published chronology's public id up to date after its
    /// identity gained aliases.
    fn refresh_public_id(&self, nid: Nid) -> Result<(), ChronicleError> {
        loop {
            let Some(current) = self.get(nid) else {
                return Ok(());
            };
            let public_id = self.identities.uuids_for(nid)?;
            if current.public_id() == &public_id {
                return Ok(());
            }
            let next = Arc::new(current.with_public_id(public_id));
            if self.swap_if_unchanged(nid, Some(&current), &next) {
                debug!("Refreshed public id of {} to {}", nid, next.public_id());
                return Ok(());
            }
        }
    }

    /// Stamp times of every version, in version order.
    fn version_times(&self, entity: &Entity) -> Vec<i64> {
        match entity {
            Entity::Stamp(c) => c.versions().iter().map(|v| v.time).collect(),
            Entity::Concept(c) => c.versions().iter().map(|v| self.stamp_time(v.stamp_nid)).collect(),
            Entity::Pattern(c) => c.versions().iter().map(|v| self.stamp_time(v.stamp_nid)).collect(),
        }
    }

    /// Time of the stamp authorizing a version, or `UNCOMMITTED_TIME` if the
    /// stamp cannot be resolved (it then sorts last).
    fn stamp_time(&self, stamp_nid: Nid) -> i64 {
        self.stamp(stamp_nid)
            .map(|stamp| stamp.time)
            .unwrap_or(UNCOMMITTED_TIME)
    }

    /// Check that `stamp_nid` names a published stamp, unless it is the
    /// chronology's own nid and the chronology is a stamp.
    fn check_stamp_reference(
        &self,
        chronology: Nid,
        stamp_nid: Nid,
        self_stamped: bool,
    ) -> Result<(), ChronicleError> {
        if self_stamped && stamp_nid == chronology {
            return Ok(());
        }
        match self.get(stamp_nid) {
            Some(entity) if entity.as_stamp().is_some() => Ok(()),
            _ => Err(ChronicleError::DanglingStampReference {
                chronology,
                stamp: stamp_nid,
            }),
        }
    }

    /// Sort key of the version being appended.
    fn version_time(&self, version: &VersionRecord) -> Result<i64, ChronicleError> {
        let nid = version.chronology_nid();
        match version {
            VersionRecord::Stamp(stamp) => Ok(stamp.time),
            _ => {
                let stamp_nid = version.stamp_nid();
                self.stamp(stamp_nid)
                    .map(|stamp| stamp.time)
                    .ok_or(ChronicleError::DanglingStampReference {
                        chronology: nid,
                        stamp: stamp_nid,
                    })
            }
        }
    }

    /// Build the successor of `existing` with `version` appended.
    ///
    /// Returns `Ok(None)` when an equal version is already present.
    fn successor(
        &self,
        existing: &Entity,
        version: VersionRecord,
        time: i64,
    ) -> Result<Option<Entity>, ChronicleError> {
        match (existing, version) {
            (Entity::Concept(chronology), VersionRecord::Concept(v)) => {
                if chronology.versions().contains(&v) {
                    return Ok(None);
                }
                let index = chronology.insertion_index(time, |c| self.stamp_time(c.stamp_nid()));
                Ok(Some(Entity::Concept(chronology.with_version_at(index, v)?)))
            }
            (Entity::Pattern(chronology), VersionRecord::Pattern(v)) => {
                if chronology.versions().contains(&v) {
                    return Ok(None);
                }
                let index = chronology.insertion_index(time, |p| self.stamp_time(p.stamp_nid()));
                Ok(Some(Entity::Pattern(chronology.with_version_at(index, v)?)))
            }
            (Entity::Stamp(chronology), VersionRecord::Stamp(v)) => {
                if chronology.versions().iter().any(|s| s.same_tuple(&v)) {
                    return Ok(None);
                }
                if chronology.versions().iter().any(|s| s.time == v.time) {
                    return Err(ChronicleError::StampConflict {
                        stamp: chronology.nid(),
                        time: v.time,
                    });
                }
                let index = chronology.insertion_index(time, |s| s.time);
                Ok(Some(Entity::Stamp(chronology.with_version_at(index, v)?)))
            }
            (existing, version) => Err(ChronicleError::KindMismatch {
                nid: existing.nid(),
                expected: existing.kind(),
                found: version.kind(),
            }),
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityService for InMemoryRegistry {
    fn nid_for(&self, uuids: &[Uuid]) -> Result<Nid, ChronicleError> {
        let nid = self.identities.nid_for(uuids)?;
        self.refresh_public_id(nid)?;
        Ok(nid)
    }

    fn nid_if_known(&self, uuids: &[Uuid]) -> Option<Nid> {
        self.identities.nid_if_known(uuids)
    }

    fn uuids_for(&self, nid: Nid) -> Result<PublicId, ChronicleError> {
        self.identities.uuids_for(nid)
    }

    fn identity_count(&self) -> usize {
        self.identities.identity_count()
    }
}

impl EntityRegistry for InMemoryRegistry {
    fn get(&self, nid: Nid) -> Option<Arc<Entity>> {
        self.entities.get(&nid).map(|entry| Arc::clone(entry.value()))
    }

    fn put(&self, entity: Entity) -> Result<Arc<Entity>, ChronicleError> {
        let nid = entity.nid();
        if entity.version_count() == 0 {
            return Err(ChronicleError::EmptyChronology(nid));
        }
        let registered = self.identities.uuids_for(nid)?;
        if let Some(uuid) = entity
            .public_id()
            .uuids()
            .iter()
            .find(|uuid| self.identities.nid_if_known(&[**uuid]) != Some(nid))
        {
            return Err(ChronicleError::IdentityMismatch { nid, uuid: *uuid });
        }

        let self_stamped = entity.as_stamp().is_some();
        for stamp_nid in entity.stamp_nids() {
            self.check_stamp_reference(nid, stamp_nid, self_stamped)?;
        }
        let times = self.version_times(&entity);
        if let Some(index) = times.windows(2).position(|pair| pair[0] > pair[1]) {
            return Err(ChronicleError::UnorderedVersions {
                nid,
                index: index + 1,
            });
        }

        let entity = Arc::new(if entity.public_id() == &registered {
            entity
        } else {
            entity.with_public_id(registered)
        });
        {
            let _gate = self.publishing();
            self.entities.insert(nid, Arc::clone(&entity));
        }
        debug!("Published {} {} ({} versions)", entity.kind(), nid, entity.version_count());
        Ok(entity)
    }

    fn append(&self, version: VersionRecord) -> Result<Arc<Entity>, ChronicleError> {
        let nid = version.chronology_nid();
        let public_id = self.identities.uuids_for(nid)?;
        let self_stamped = matches!(version, VersionRecord::Stamp(_));
        self.check_stamp_reference(nid, version.stamp_nid(), self_stamped)?;
        let time = self.version_time(&version)?;

        loop {
            let current = self.get(nid);
            let next = match &current {
                None => Entity::from_first_version(public_id.clone(), version.clone())?,
                Some(existing) => match self.successor(existing, version.clone(), time)? {
                    Some(next) if next.public_id() == &public_id => next,
                    Some(next) => next.with_public_id(public_id.clone()),
                    None if existing.public_id() != &public_id => {
                        existing.with_public_id(public_id.clone())
                    }
                    None => {
                        trace!("Version already present in {}", nid);
                        return Ok(Arc::clone(existing));
                    }
                },
            };
            let next = Arc::new(next);

            if self.swap_if_unchanged(nid, current.as_ref(), &next) {
                trace!("Published {} {} ({} versions)", next.kind(), nid, next.version_count());
                return Ok(next);
            }
            trace!("Concurrent append on {}; rebuilding", nid);
        }
    }

    fn snapshot(&self) -> RegistrySnapshot {
        let _gate = self
            .publish_gate
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entities: BTreeMap<Nid, Arc<Entity>> = self
            .entities
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        let active = self.identities.nid_if_known(&[WellKnown::Active.uuid()]);
        RegistrySnapshot::new(entities, active)
    }

    fn len(&self) -> usize {
        self.entities.len()
    }
}

/// Build a one-version chronology for an already-allocated identity and
/// publish it. Convenience for bootstrap data and tests.
pub fn publish_first_version(
    registry: &dyn EntityRegistry,
    version: VersionRecord,
) -> Result<Arc<Entity>, ChronicleError> {
    let public_id = registry.uuids_for(version.chronology_nid())?;
    registry.put(Entity::from_first_version(public_id, version)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::chronology::Chronology;
    use chronicle_core::version::{ConceptVersion, StampVersion};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn stamp_version(registry: &InMemoryRegistry, time: i64) -> StampVersion {
        let nid = registry.nid_for(&[Uuid::new_v4()]).unwrap();
        StampVersion {
            chronology_nid: nid,
            status_nid: Nid::new(1),
            time,
            author_nid: Nid::new(1),
            module_nid: Nid::new(1),
            path_nid: Nid::new(1),
        }
    }

    fn publish_stamp(registry: &InMemoryRegistry, time: i64) -> Nid {
        let v = stamp_version(registry, time);
        registry.append(VersionRecord::Stamp(v)).unwrap().nid()
    }

    fn concept_version(concept: Nid, stamp: Nid) -> VersionRecord {
        VersionRecord::Concept(ConceptVersion {
            chronology_nid: concept,
            stamp_nid: stamp,
        })
    }

    #[test]
    fn test_get_absent() {
        let registry = InMemoryRegistry::new();
        assert!(registry.get(Nid::new(1)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_append_requires_allocated_identity() {
        let registry = InMemoryRegistry::new();
        let stamp = publish_stamp(&registry, 10);
        let err = registry.append(concept_version(Nid::new(999), stamp)).unwrap_err();
        assert!(matches!(err, ChronicleError::UnknownIdentity(_)));
    }

    #[test]
    fn test_append_rejects_dangling_stamp() {
        let registry = InMemoryRegistry::new();
        let concept = registry.nid_for(&[Uuid::new_v4()]).unwrap();
        let ghost = registry.nid_for(&[Uuid::new_v4()]).unwrap();
        let err = registry.append(concept_version(concept, ghost)).unwrap_err();
        assert!(matches!(err, ChronicleError::DanglingStampReference { .. }));
        assert!(registry.get(concept).is_none(), "failed append must not publish");
    }

    #[test]
    fn test_versions_ordered_by_stamp_time() {
        let registry = InMemoryRegistry::new();
        let late = publish_stamp(&registry, 300);
        let early = publish_stamp(&registry, 100);
        let middle = publish_stamp(&registry, 200);
        let concept = registry.nid_for(&[Uuid::new_v4()]).unwrap();

        registry.append(concept_version(concept, late)).unwrap();
        registry.append(concept_version(concept, early)).unwrap();
        let entity = registry.append(concept_version(concept, middle)).unwrap();

        assert_eq!(entity.stamp_nids(), vec![early, middle, late]);
    }

    #[test]
    fn test_equal_times_keep_insertion_order() {
        let registry = InMemoryRegistry::new();
        let first = publish_stamp(&registry, 100);
        let second = publish_stamp(&registry, 100);
        let concept = registry.nid_for(&[Uuid::new_v4()]).unwrap();
        registry.append(concept_version(concept, first)).unwrap();
        let entity = registry.append(concept_version(concept, second)).unwrap();
        assert_eq!(entity.stamp_nids(), vec![first, second]);
    }

    #[test]
    fn test_duplicate_append_is_idempotent() {
        let registry = InMemoryRegistry::new();
        let stamp = publish_stamp(&registry, 100);
        let concept = registry.nid_for(&[Uuid::new_v4()]).unwrap();
        let a = registry.append(concept_version(concept, stamp)).unwrap();
        let b = registry.append(concept_version(concept, stamp)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.version_count(), 1);
    }

    #[test]
    fn test_kind_mismatch() {
        let registry = InMemoryRegistry::new();
        let stamp = publish_stamp(&registry, 100);
        let err = registry.append(concept_version(stamp, stamp)).unwrap_err();
        assert!(matches!(err, ChronicleError::KindMismatch { expected: "stamp", found: "concept", .. }));
    }

    #[test]
    fn test_stamp_conflict_on_same_time() {
        let registry = InMemoryRegistry::new();
        let v = stamp_version(&registry, 100);
        registry.append(VersionRecord::Stamp(v.clone())).unwrap();
        let conflicting = StampVersion {
            status_nid: Nid::new(2),
            ..v
        };
        let err = registry.append(VersionRecord::Stamp(conflicting)).unwrap_err();
        assert!(matches!(err, ChronicleError::StampConflict { time: 100, .. }));
    }

    #[test]
    fn test_put_checks_references() {
        let registry = InMemoryRegistry::new();
        let concept = registry.nid_for(&[Uuid::new_v4()]).unwrap();
        let ghost = registry.nid_for(&[Uuid::new_v4()]).unwrap();
        let entity = Entity::Concept(
            Chronology::new(
                concept,
                registry.uuids_for(concept).unwrap(),
                ConceptVersion {
                    chronology_nid: concept,
                    stamp_nid: ghost,
                },
            )
            .unwrap(),
        );
        assert!(matches!(
            registry.put(entity),
            Err(ChronicleError::DanglingStampReference { .. })
        ));
    }

    #[test]
    fn test_publish_first_version_replaces_whole_chronology() {
        let registry = InMemoryRegistry::new();
        let s1 = publish_stamp(&registry, 100);
        let s2 = publish_stamp(&registry, 200);
        let concept = registry.nid_for(&[Uuid::new_v4()]).unwrap();
        registry.append(concept_version(concept, s1)).unwrap();
        registry.append(concept_version(concept, s2)).unwrap();

        let entity = publish_first_version(&registry, concept_version(concept, s2)).unwrap();
        assert_eq!(entity.stamp_nids(), vec![s2]);
        assert_eq!(registry.get(concept).unwrap().version_count(), 1);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_appends() {
        let registry = InMemoryRegistry::new();
        let s1 = publish_stamp(&registry, 100);
        let s2 = publish_stamp(&registry, 200);
        let concept = registry.nid_for(&[Uuid::new_v4()]).unwrap();
        registry.append(concept_version(concept, s1)).unwrap();

        let snapshot = registry.snapshot();
        registry.append(concept_version(concept, s2)).unwrap();

        assert_eq!(snapshot.get(concept).unwrap().version_count(), 1);
        assert_eq!(registry.get(concept).unwrap().version_count(), 2);
    }

    #[test]
    fn test_concurrent_appends_to_one_chronology_lose_nothing() {
        let registry = Arc::new(InMemoryRegistry::with_shard_amount(4));
        let stamps: Vec<Nid> = (0..32).map(|i| publish_stamp(&registry, i)).collect();
        let concept = registry.nid_for(&[Uuid::new_v4()]).unwrap();

        std::thread::scope(|scope| {
            for chunk in stamps.chunks(8) {
                let registry = Arc::clone(&registry);
                scope.spawn(move || {
                    for stamp in chunk {
                        registry.append(concept_version(concept, *stamp)).unwrap();
                    }
                });
            }
        });

        let entity = registry.get(concept).unwrap();
        assert_eq!(entity.version_count(), 32);
        assert_eq!(entity.stamp_nids(), stamps, "versions must end up in time order");
    }

    #[test]
    fn test_put_rejects_versions_out_of_time_order() {
        let registry = InMemoryRegistry::new();
        let early = publish_stamp(&registry, 100);
        let late = publish_stamp(&registry, 300);
        let concept = registry.nid_for(&[Uuid::new_v4()]).unwrap();
        let entity = Entity::Concept(
            Chronology::from_versions(
                concept,
                registry.uuids_for(concept).unwrap(),
                vec![
                    ConceptVersion {
                        chronology_nid: concept,
                        stamp_nid: late,
                    },
                    ConceptVersion {
                        chronology_nid: concept,
                        stamp_nid: early,
                    },
                ],
            )
            .unwrap(),
        );
        let err = registry.put(entity).unwrap_err();
        assert!(matches!(err, ChronicleError::UnorderedVersions { index: 1, .. }));
        assert!(registry.get(concept).is_none());
    }

    #[test]
    fn test_put_rejects_foreign_public_id() {
        let registry = InMemoryRegistry::new();
        let stamp = publish_stamp(&registry, 100);
        let concept = registry.nid_for(&[Uuid::new_v4()]).unwrap();
        let stranger = Uuid::new_v4();
        let entity = Entity::Concept(
            Chronology::new(
                concept,
                PublicId::single(stranger),
                ConceptVersion {
                    chronology_nid: concept,
                    stamp_nid: stamp,
                },
            )
            .unwrap(),
        );
        let err = registry.put(entity).unwrap_err();
        assert!(matches!(err, ChronicleError::IdentityMismatch { uuid, .. } if uuid == stranger));
    }

    #[test]
    fn test_alias_widens_published_public_id() {
        let registry = InMemoryRegistry::new();
        let stamp = publish_stamp(&registry, 100);
        let first = Uuid::new_v4();
        let alias = Uuid::new_v4();
        let concept = registry.nid_for(&[first]).unwrap();
        registry.append(concept_version(concept, stamp)).unwrap();

        assert_eq!(registry.nid_for(&[first, alias]).unwrap(), concept);
        let entity = registry.get(concept).unwrap();
        assert!(entity.public_id().contains(&alias));
        assert_eq!(entity.public_id(), &registry.uuids_for(concept).unwrap());
        assert_eq!(entity.version_count(), 1);
    }

    #[test]
    fn test_snapshot_never_sees_version_without_its_stamp() {
        let registry = Arc::new(InMemoryRegistry::with_shard_amount(4));
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            let writers: Vec<_> = (0..4i64)
                .map(|worker| {
                    let registry = Arc::clone(&registry);
                    scope.spawn(move || {
                        for i in 0..200 {
                            let stamp = publish_stamp(&registry, worker * 1_000 + i);
                            let concept = registry.nid_for(&[Uuid::new_v4()]).unwrap();
                            registry.append(concept_version(concept, stamp)).unwrap();
                        }
                    })
                })
                .collect();
            let reader = scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    let snapshot = registry.snapshot();
                    assert!(snapshot.dangling_stamp_references().is_empty());
                }
            });
            for writer in writers {
                writer.join().unwrap();
            }
            done.store(true, Ordering::Release);
            reader.join().unwrap();
        });

        assert!(registry.snapshot().dangling_stamp_references().is_empty());
        assert_eq!(registry.snapshot().counts(), (800, 0, 800));
    }
}
