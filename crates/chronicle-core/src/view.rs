// crates/chronicle-core/src/view.rs
//
// Read-only view consumed by the classification service: concepts with their
// latest active versions, and the patterns carrying stated relationships.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::entity::{ConceptChronology, Entity, PatternChronology};
use crate::identity::Nid;
use crate::version::{ConceptVersion, StampVersion, VersionData};
use crate::well_known::WellKnown;

/// What a classifier needs from the store.
pub trait StatedView {
    /// Nids of every concept chronology, ascending.
    fn concept_nids(&self) -> Vec<Nid>;

    /// Latest version of concept `nid` if that version's stamp is Active.
    fn latest_active_concept(&self, nid: Nid) -> Option<&ConceptVersion>;

    /// Every pattern chronology, ascending by nid.
    fn patterns(&self) -> Vec<&PatternChronology>;

    /// The pattern describing stated (pre-classification) relationships.
    fn stated_pattern(&self) -> Option<&PatternChronology>;
}

/// Immutable point-in-time copy of the registry.
///
/// Holds shared references to published chronologies, so taking one copies
/// pointers, never chronology contents, and never blocks writers afterwards.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    entities: BTreeMap<Nid, Arc<Entity>>,
    active_nid: Option<Nid>,
}

impl RegistrySnapshot {
    /// `active_nid` is the nid of the Active status concept, if allocated.
    pub fn new(entities: BTreeMap<Nid, Arc<Entity>>, active_nid: Option<Nid>) -> Self {
        Self {
            entities,
            active_nid,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, nid: Nid) -> Option<&Entity> {
        self.entities.get(&nid).map(|e| &**e)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().map(|e| &**e)
    }

    pub fn concepts(&self) -> impl Iterator<Item = &ConceptChronology> {
        self.entities().filter_map(Entity::as_concept)
    }

    /// Count of chronologies per kind: (concepts, patterns, stamps).
    pub fn counts(&self) -> (usize, usize, usize) {
        self.entities()
            .fold((0, 0, 0), |(c, p, s), entity| match entity {
                Entity::Concept(_) => (c + 1, p, s),
                Entity::Pattern(_) => (c, p + 1, s),
                Entity::Stamp(_) => (c, p, s + 1),
            })
    }

    pub fn stamp(&self, nid: Nid) -> Option<&StampVersion> {
        self.get(nid).and_then(Entity::as_stamp).map(|s| s.latest())
    }

    fn is_active(&self, stamp_nid: Nid) -> bool {
        match (self.active_nid, self.stamp(stamp_nid)) {
            (Some(active), Some(stamp)) => stamp.status_nid == active,
            _ => false,
        }
    }

    /// Stamp nids referenced by any version but absent from this snapshot.
    pub fn dangling_stamp_references(&self) -> Vec<(Nid, Nid)> {
        let mut dangling = Vec::new();
        for entity in self.entities() {
            for stamp_nid in entity.stamp_nids() {
                if self.stamp(stamp_nid).is_none() {
                    dangling.push((entity.nid(), stamp_nid));
                }
            }
        }
        dangling
    }
}

impl StatedView for RegistrySnapshot {
    fn concept_nids(&self) -> Vec<Nid> {
        self.concepts().map(|c| c.nid()).collect()
    }

    fn latest_active_concept(&self, nid: Nid) -> Option<&ConceptVersion> {
        let concept = self.get(nid)?.as_concept()?;
        let latest = concept.latest();
        self.is_active(latest.stamp_nid()).then_some(latest)
    }

    fn patterns(&self) -> Vec<&PatternChronology> {
        self.entities().filter_map(Entity::as_pattern).collect()
    }

    fn stated_pattern(&self) -> Option<&PatternChronology> {
        let stated = WellKnown::StatedPattern.uuid();
        self.entities()
            .filter_map(Entity::as_pattern)
            .find(|p| p.public_id().contains(&stated))
    }
}
