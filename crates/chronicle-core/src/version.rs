// crates/chronicle-core/src/version.rs
//
// Version payloads. A version is an immutable snapshot stamped by exactly one
// stamp; it refers to its owning chronology by nid only; sibling versions are
// reached through the registry.

use serde::{Deserialize, Serialize};

use crate::error::ChronicleError;
use crate::identity::Nid;

/// Behaviour shared by every version kind.
pub trait VersionData: Clone + Send + Sync + 'static {
    /// Nid of the owning chronology.
    fn chronology_nid(&self) -> Nid;

    /// Nid of the stamp authorizing this version.
    fn stamp_nid(&self) -> Nid;

    /// Stamp time carried inline, if this version is itself provenance.
    fn inline_time(&self) -> Option<i64> {
        None
    }
}

/// A terminology concept at one point in its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptVersion {
    pub chronology_nid: Nid,
    pub stamp_nid: Nid,
}

impl VersionData for ConceptVersion {
    fn chronology_nid(&self) -> Nid {
        self.chronology_nid
    }

    fn stamp_nid(&self) -> Nid {
        self.stamp_nid
    }
}

/// One STAMP tuple: Status, Time, Author, Module, Path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampVersion {
    /// Nid of the stamp chronology this tuple belongs to.
    pub chronology_nid: Nid,
    pub status_nid: Nid,
    pub time: i64,
    pub author_nid: Nid,
    pub module_nid: Nid,
    pub path_nid: Nid,
}

impl StampVersion {
    /// Compare the provenance tuple, ignoring the owner.
    pub fn same_tuple(&self, other: &StampVersion) -> bool {
        self.status_nid == other.status_nid
            && self.time == other.time
            && self.author_nid == other.author_nid
            && self.module_nid == other.module_nid
            && self.path_nid == other.path_nid
    }
}

impl VersionData for StampVersion {
    fn chronology_nid(&self) -> Nid {
        self.chronology_nid
    }

    /// A stamp version is authorized by its own stamp.
    fn stamp_nid(&self) -> Nid {
        self.chronology_nid
    }

    fn inline_time(&self) -> Option<i64> {
        Some(self.time)
    }
}

/// Declared data type of a pattern field or entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldDataType {
    ConceptChronology,
    PatternChronology,
    Stamp,
    String,
    Long,
    Integer,
    Float,
    Boolean,
    ComponentIdList,
}

impl FieldDataType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldDataType::ConceptChronology => "CONCEPT_CHRONOLOGY",
            FieldDataType::PatternChronology => "PATTERN_CHRONOLOGY",
            FieldDataType::Stamp => "STAMP",
            FieldDataType::String => "STRING",
            FieldDataType::Long => "LONG",
            FieldDataType::Integer => "INTEGER",
            FieldDataType::Float => "FLOAT",
            FieldDataType::Boolean => "BOOLEAN",
            FieldDataType::ComponentIdList => "COMPONENT_ID_LIST",
        }
    }
}

/// One field of a pattern's semantic schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub meaning_nid: Nid,
    pub purpose_nid: Nid,
    pub data_type: FieldDataType,
    pub index: usize,
}

/// A value in a data row instantiating a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Concept(Nid),
    Pattern(Nid),
    Stamp(Nid),
    String(String),
    Long(i64),
    Integer(i32),
    Float(f32),
    Boolean(bool),
    ComponentIdList(Vec<Nid>),
}

impl FieldValue {
    pub fn data_type(&self) -> FieldDataType {
        match self {
            FieldValue::Concept(_) => FieldDataType::ConceptChronology,
            FieldValue::Pattern(_) => FieldDataType::PatternChronology,
            FieldValue::Stamp(_) => FieldDataType::Stamp,
            FieldValue::String(_) => FieldDataType::String,
            FieldValue::Long(_) => FieldDataType::Long,
            FieldValue::Integer(_) => FieldDataType::Integer,
            FieldValue::Float(_) => FieldDataType::Float,
            FieldValue::Boolean(_) => FieldDataType::Boolean,
            FieldValue::ComponentIdList(_) => FieldDataType::ComponentIdList,
        }
    }
}

/// A semantic pattern at one point in its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternVersion {
    pub chronology_nid: Nid,
    pub stamp_nid: Nid,
    /// What the pattern means.
    pub meaning_nid: Nid,
    /// What the pattern is for.
    pub purpose_nid: Nid,
    /// Ordered field definitions; `fields[i].index == i`.
    pub fields: Vec<FieldDefinition>,
}

impl PatternVersion {
    /// Check a data row against this version's field definitions.
    pub fn validate(&self, values: &[FieldValue]) -> Result<(), ChronicleError> {
        if values.len() != self.fields.len() {
            return Err(ChronicleError::SchemaViolation(format!(
                "pattern {} declares {} fields, row has {}",
                self.chronology_nid,
                self.fields.len(),
                values.len()
            )));
        }
        for (field, value) in self.fields.iter().zip(values) {
            if value.data_type() != field.data_type {
                return Err(ChronicleError::SchemaViolation(format!(
                    "pattern {} field {} expects {}, got {}",
                    self.chronology_nid,
                    field.index,
                    field.data_type.as_str(),
                    value.data_type().as_str()
                )));
            }
        }
        Ok(())
    }
}

impl VersionData for PatternVersion {
    fn chronology_nid(&self) -> Nid {
        self.chronology_nid
    }

    fn stamp_nid(&self) -> Nid {
        self.stamp_nid
    }
}

/// Tagged union over the three version payloads, used at the registry seam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VersionRecord {
    Concept(ConceptVersion),
    Pattern(PatternVersion),
    Stamp(StampVersion),
}

impl VersionRecord {
    pub fn chronology_nid(&self) -> Nid {
        match self {
            VersionRecord::Concept(v) => v.chronology_nid(),
            VersionRecord::Pattern(v) => v.chronology_nid(),
            VersionRecord::Stamp(v) => v.chronology_nid(),
        }
    }

    pub fn stamp_nid(&self) -> Nid {
        match self {
            VersionRecord::Concept(v) => v.stamp_nid(),
            VersionRecord::Pattern(v) => v.stamp_nid(),
            VersionRecord::Stamp(v) => v.stamp_nid(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            VersionRecord::Concept(_) => "concept",
            VersionRecord::Pattern(_) => "pattern",
            VersionRecord::Stamp(_) => "stamp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(fields: Vec<FieldDataType>) -> PatternVersion {
        PatternVersion {
            chronology_nid: Nid::new(10),
            stamp_nid: Nid::new(2),
            meaning_nid: Nid::new(3),
            purpose_nid: Nid::new(4),
            fields: fields
                .into_iter()
                .enumerate()
                .map(|(index, data_type)| FieldDefinition {
                    meaning_nid: Nid::new(5),
                    purpose_nid: Nid::new(6),
                    data_type,
                    index,
                })
                .collect(),
        }
    }

    #[test]
    fn test_stamp_version_is_self_stamped() {
        let v = StampVersion {
            chronology_nid: Nid::new(7),
            status_nid: Nid::new(1),
            time: 100,
            author_nid: Nid::new(2),
            module_nid: Nid::new(3),
            path_nid: Nid::new(4),
        };
        assert_eq!(v.stamp_nid(), Nid::new(7));
        assert_eq!(v.inline_time(), Some(100));
    }

    #[test]
    fn test_same_tuple_ignores_owner() {
        let a = StampVersion {
            chronology_nid: Nid::new(7),
            status_nid: Nid::new(1),
            time: 100,
            author_nid: Nid::new(2),
            module_nid: Nid::new(3),
            path_nid: Nid::new(4),
        };
        let b = StampVersion {
            chronology_nid: Nid::new(8),
            ..a.clone()
        };
        let c = StampVersion {
            status_nid: Nid::new(9),
            ..a.clone()
        };
        assert!(a.same_tuple(&b));
        assert!(!a.same_tuple(&c));
    }

    #[test]
    fn test_validate_accepts_matching_row() {
        let p = pattern(vec![FieldDataType::ConceptChronology, FieldDataType::String]);
        let row = vec![FieldValue::Concept(Nid::new(1)), FieldValue::String("x".into())];
        assert!(p.validate(&row).is_ok());
    }

    #[test]
    fn test_validate_rejects_arity_and_type() {
        let p = pattern(vec![FieldDataType::Long]);
        assert!(matches!(
            p.validate(&[]),
            Err(ChronicleError::SchemaViolation(_))
        ));
        let err = p.validate(&[FieldValue::String("1".into())]).unwrap_err();
        assert!(err.to_string().contains("expects LONG, got STRING"));
    }

    #[test]
    fn test_field_data_type_serde_name() {
        let json = serde_json::to_string(&FieldDataType::ConceptChronology).unwrap();
        assert_eq!(json, "\"CONCEPT_CHRONOLOGY\"");
        let parsed: FieldDataType = serde_json::from_str("\"COMPONENT_ID_LIST\"").unwrap();
        assert_eq!(parsed, FieldDataType::ComponentIdList);
    }
}
