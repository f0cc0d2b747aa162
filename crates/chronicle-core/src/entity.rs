// crates/chronicle-core/src/entity.rs

use serde::{Deserialize, Serialize};

use crate::chronology::Chronology;
use crate::identity::{Nid, PublicId};
use crate::version::{
    ConceptVersion, FieldDataType, PatternVersion, StampVersion, VersionData, VersionRecord,
};

pub type ConceptChronology = Chronology<ConceptVersion>;
pub type PatternChronology = Chronology<PatternVersion>;
pub type StampChronology = Chronology<StampVersion>;

/// A published chronology of any kind. This is what the registry stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    Concept(ConceptChronology),
    Pattern(PatternChronology),
    Stamp(StampChronology),
}

impl Entity {
    pub fn nid(&self) -> Nid {
        match self {
            Entity::Concept(c) => c.nid(),
            Entity::Pattern(c) => c.nid(),
            Entity::Stamp(c) => c.nid(),
        }
    }

    pub fn public_id(&self) -> &PublicId {
        match self {
            Entity::Concept(c) => c.public_id(),
            Entity::Pattern(c) => c.public_id(),
            Entity::Stamp(c) => c.public_id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Concept(_) => "concept",
            Entity::Pattern(_) => "pattern",
            Entity::Stamp(_) => "stamp",
        }
    }

    pub fn entity_data_type(&self) -> FieldDataType {
        match self {
            Entity::Concept(_) => FieldDataType::ConceptChronology,
            Entity::Pattern(_) => FieldDataType::PatternChronology,
            Entity::Stamp(_) => FieldDataType::Stamp,
        }
    }

    pub fn version_count(&self) -> usize {
        match self {
            Entity::Concept(c) => c.len(),
            Entity::Pattern(c) => c.len(),
            Entity::Stamp(c) => c.len(),
        }
    }

    /// Stamp nids of every version, in version order.
    pub fn stamp_nids(&self) -> Vec<Nid> {
        match self {
            Entity::Concept(c) => c.versions().iter().map(|v| v.stamp_nid()).collect(),
            Entity::Pattern(c) => c.versions().iter().map(|v| v.stamp_nid()).collect(),
            Entity::Stamp(c) => c.versions().iter().map(|v| v.stamp_nid()).collect(),
        }
    }

    /// Copy of this entity carrying `public_id`, versions unchanged.
    pub fn with_public_id(&self, public_id: PublicId) -> Self {
        match self {
            Entity::Concept(c) => Entity::Concept(c.with_public_id(public_id)),
            Entity::Pattern(c) => Entity::Pattern(c.with_public_id(public_id)),
            Entity::Stamp(c) => Entity::Stamp(c.with_public_id(public_id)),
        }
    }

    /// Build a one-version entity from a version record.
    pub fn from_first_version(
        public_id: PublicId,
        version: VersionRecord,
    ) -> Result<Self, crate::error::ChronicleError> {
        let nid = version.chronology_nid();
        Ok(match version {
            VersionRecord::Concept(v) => Entity::Concept(Chronology::new(nid, public_id, v)?),
            VersionRecord::Pattern(v) => Entity::Pattern(Chronology::new(nid, public_id, v)?),
            VersionRecord::Stamp(v) => Entity::Stamp(Chronology::new(nid, public_id, v)?),
        })
    }

    pub fn as_concept(&self) -> Option<&ConceptChronology> {
        match self {
            Entity::Concept(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_pattern(&self) -> Option<&PatternChronology> {
        match self {
            Entity::Pattern(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_stamp(&self) -> Option<&StampChronology> {
        match self {
            Entity::Stamp(c) => Some(c),
            _ => None,
        }
    }
}

impl From<ConceptChronology> for Entity {
    fn from(c: ConceptChronology) -> Self {
        Entity::Concept(c)
    }
}

impl From<PatternChronology> for Entity {
    fn from(c: PatternChronology) -> Self {
        Entity::Pattern(c)
    }
}

impl From<StampChronology> for Entity {
    fn from(c: StampChronology) -> Self {
        Entity::Stamp(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_from_first_version_picks_kind() {
        let version = VersionRecord::Concept(ConceptVersion {
            chronology_nid: Nid::new(5),
            stamp_nid: Nid::new(2),
        });
        let entity = Entity::from_first_version(PublicId::single(Uuid::new_v4()), version).unwrap();
        assert_eq!(entity.nid(), Nid::new(5));
        assert_eq!(entity.kind(), "concept");
        assert_eq!(entity.entity_data_type(), FieldDataType::ConceptChronology);
        assert_eq!(entity.stamp_nids(), vec![Nid::new(2)]);
        assert!(entity.as_stamp().is_none());
    }

    #[test]
    fn test_stamp_entity_references_itself() {
        let version = VersionRecord::Stamp(StampVersion {
            chronology_nid: Nid::new(9),
            status_nid: Nid::new(1),
            time: 0,
            author_nid: Nid::new(2),
            module_nid: Nid::new(3),
            path_nid: Nid::new(4),
        });
        let entity = Entity::from_first_version(PublicId::single(Uuid::new_v4()), version).unwrap();
        assert_eq!(entity.stamp_nids(), vec![Nid::new(9)]);
        assert_eq!(entity.entity_data_type(), FieldDataType::Stamp);
    }

    #[test]
    fn test_with_public_id_keeps_versions() {
        let first = Uuid::new_v4();
        let alias = Uuid::new_v4();
        let version = VersionRecord::Concept(ConceptVersion {
            chronology_nid: Nid::new(5),
            stamp_nid: Nid::new(2),
        });
        let entity = Entity::from_first_version(PublicId::single(first), version).unwrap();
        let widened = entity.with_public_id(PublicId::new(&[first, alias]).unwrap());
        assert!(widened.public_id().contains(&alias));
        assert_eq!(widened.stamp_nids(), entity.stamp_nids());
        assert_eq!(entity.public_id().uuids(), &[first]);
    }
}
