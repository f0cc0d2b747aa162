// crates/chronicle-ingest/src/starter.rs
//
// Starter data: a JSON document describing the concepts and patterns a
// terminology load builds on, all authorized by one STAMP.
//
//   {
//     "namespace": "<uuid>",
//     "STAMP":    { "status", "time", "author", "module", "path", "uuid"? },
//     "concepts": [ { "uuids": [...], "description"? } ],
//     "patterns": [ { "uuids", "meaning", "purpose", "fields": [ { "meaning", "purpose", "dataType" } ] } ]
//   }
//
// Every reference is either a UUID string or the name of a well-known concept.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use chronicle_core::entity::{ConceptChronology, Entity, PatternChronology, StampChronology};
use chronicle_core::error::ChronicleError;
use chronicle_core::identity::{Nid, PublicId};
use chronicle_core::traits::{EntityRegistry, IdentityService};
use chronicle_core::version::{
    ConceptVersion, FieldDataType, FieldDefinition, PatternVersion, StampVersion, VersionRecord,
};
use chronicle_core::well_known::WellKnown;
use chronicle_store::stamp::{build_stamp, resolve_reference, StampRequest};

#[derive(Debug, Clone, Deserialize)]
struct StarterDocument {
    namespace: Uuid,
    #[serde(rename = "STAMP")]
    stamp: StampDecl,
    #[serde(default)]
    concepts: Vec<ConceptDecl>,
    #[serde(default)]
    patterns: Vec<PatternDecl>,
}

#[derive(Debug, Clone, Deserialize)]
struct StampDecl {
    status: String,
    time: i64,
    author: String,
    module: String,
    path: String,
    /// Explicit stamp identity; derived from the tuple when absent.
    #[serde(default)]
    uuid: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
struct ConceptDecl {
    uuids: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PatternDecl {
    uuids: Vec<String>,
    meaning: String,
    purpose: String,
    #[serde(default)]
    fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldDecl {
    meaning: String,
    purpose: String,
    #[serde(rename = "dataType")]
    data_type: FieldDataType,
}

/// A parsed starter-data document.
#[derive(Debug, Clone)]
pub struct StarterData {
    raw: Value,
    document: StarterDocument,
}

/// Parse a reference: a UUID string or a well-known concept name.
pub fn reference_uuid(raw: &str) -> Result<Uuid, ChronicleError> {
    Uuid::parse_str(raw.trim())
        .ok()
        .or_else(|| WellKnown::from_label(raw).map(WellKnown::uuid))
        .ok_or_else(|| {
            ChronicleError::Serialization(format!(
                "'{}' is neither a UUID nor a well-known concept",
                raw
            ))
        })
}

fn reference_uuids(raw: &[String]) -> Result<Vec<Uuid>, ChronicleError> {
    raw.iter().map(|r| reference_uuid(r)).collect()
}

impl StarterData {
    pub fn from_json_str(json: &str) -> Result<Self, ChronicleError> {
        let raw: Value = serde_json::from_str(json)?;
        let document: StarterDocument = serde_json::from_value(raw.clone())?;
        Ok(Self { raw, document })
    }

    pub fn load(path: &Path) -> Result<Self, ChronicleError> {
        let json = fs::read_to_string(path)
            .map_err(|e| ChronicleError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Text at a nested object path, e.g. `["STAMP", "status"]`.
    pub fn field_text(&self, path: &[&str]) -> Option<&str> {
        self.field(path).and_then(Value::as_str)
    }

    /// Integer at a nested object path, e.g. `["STAMP", "time"]`.
    pub fn field_long(&self, path: &[&str]) -> Option<i64> {
        self.field(path).and_then(Value::as_i64)
    }

    fn field(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.raw, |value, key| value.get(key))
    }

    /// Resolve the reference at `path` to a nid without allocating.
    pub fn nid_of<R: EntityRegistry + ?Sized>(
        &self,
        registry: &R,
        path: &[&str],
    ) -> Result<Nid, ChronicleError> {
        let raw = self.field_text(path).ok_or_else(|| {
            ChronicleError::Serialization(format!("missing text field {}", path.join(".")))
        })?;
        resolve_reference(registry, "starter data", &[reference_uuid(raw)?])
    }

    /// The document's STAMP as a build request.
    pub fn stamp_request(&self) -> Result<StampRequest, ChronicleError> {
        let decl = &self.document.stamp;
        let status = reference_uuid(&decl.status)?;
        let author = reference_uuid(&decl.author)?;
        let module = reference_uuid(&decl.module)?;
        let path = reference_uuid(&decl.path)?;
        let identity = decl.uuid.unwrap_or_else(|| {
            let seed = format!("{}|{}|{}|{}|{}", status, decl.time, author, module, path);
            Uuid::new_v5(&self.document.namespace, seed.as_bytes())
        });
        Ok(StampRequest {
            status: status.into(),
            time: decl.time,
            author: author.into(),
            module: module.into(),
            path: path.into(),
            identity: PublicId::single(identity),
        })
    }

    /// The document's STAMP resolved as a version of `stamp_nid` at `time`.
    /// Nothing is published.
    pub fn stamp_version<R: EntityRegistry + ?Sized>(
        &self,
        registry: &R,
        stamp_nid: Nid,
        time: i64,
    ) -> Result<StampVersion, ChronicleError> {
        let mut resolved = self.stamp_request()?.resolve(registry)?;
        resolved.time = time;
        Ok(resolved.into_version(stamp_nid))
    }

    /// Publish (or reuse) the document's stamp.
    pub fn build_stamp_chronology<R: EntityRegistry + ?Sized>(
        &self,
        registry: &R,
    ) -> Result<StampChronology, ChronicleError> {
        build_stamp(registry, &self.stamp_request()?)
    }

    /// Publish every declared concept under the document's stamp.
    pub fn build_concept_chronologies<R: EntityRegistry + ?Sized>(
        &self,
        registry: &R,
    ) -> Result<Vec<ConceptChronology>, ChronicleError> {
        let stamp = self.build_stamp_chronology(registry)?;
        let mut concepts = Vec::with_capacity(self.document.concepts.len());
        for decl in &self.document.concepts {
            let uuids = reference_uuids(&decl.uuids)?;
            let nid = registry.nid_for(&uuids)?;
            let entity = registry.append(VersionRecord::Concept(ConceptVersion {
                chronology_nid: nid,
                stamp_nid: stamp.nid(),
            }))?;
            debug!(
                "Starter concept {} {}",
                nid,
                decl.description.as_deref().unwrap_or("")
            );
            concepts.push(expect_concept(&entity, nid)?);
        }
        info!("Built {} starter concepts", concepts.len());
        Ok(concepts)
    }

    /// Publish every declared pattern under the document's stamp.
    ///
    /// Meaning and purpose references must already resolve, so concepts are
    /// normally built first.
    pub fn build_pattern_chronologies<R: EntityRegistry + ?Sized>(
        &self,
        registry: &R,
    ) -> Result<Vec<PatternChronology>, ChronicleError> {
        let stamp = self.build_stamp_chronology(registry)?;
        let mut patterns = Vec::with_capacity(self.document.patterns.len());
        for decl in &self.document.patterns {
            let meaning_nid = resolve_reference(registry, "pattern meaning", &[reference_uuid(&decl.meaning)?])?;
            let purpose_nid = resolve_reference(registry, "pattern purpose", &[reference_uuid(&decl.purpose)?])?;
            let mut fields = Vec::with_capacity(decl.fields.len());
            for (index, field) in decl.fields.iter().enumerate() {
                fields.push(FieldDefinition {
                    meaning_nid: resolve_reference(registry, "field meaning", &[reference_uuid(&field.meaning)?])?,
                    purpose_nid: resolve_reference(registry, "field purpose", &[reference_uuid(&field.purpose)?])?,
                    data_type: field.data_type,
                    index,
                });
            }

            let uuids = reference_uuids(&decl.uuids)?;
            let nid = registry.nid_for(&uuids)?;
            let entity = registry.append(VersionRecord::Pattern(PatternVersion {
                chronology_nid: nid,
                stamp_nid: stamp.nid(),
                meaning_nid,
                purpose_nid,
                fields,
            }))?;
            patterns.push(entity.as_pattern().cloned().ok_or(ChronicleError::KindMismatch {
                nid,
                expected: "pattern",
                found: entity.kind(),
            })?);
        }
        info!("Built {} starter patterns", patterns.len());
        Ok(patterns)
    }
}

/// Publish the stamp, then concepts, then patterns.
pub fn publish_starter_data<R: EntityRegistry + ?Sized>(
    registry: &R,
    data: &StarterData,
) -> Result<(Vec<ConceptChronology>, Vec<PatternChronology>), ChronicleError> {
    let concepts = data.build_concept_chronologies(registry)?;
    let patterns = data.build_pattern_chronologies(registry)?;
    Ok((concepts, patterns))
}

fn expect_concept(
    entity: &Entity,
    nid: Nid,
) -> Result<ConceptChronology, ChronicleError> {
    entity.as_concept().cloned().ok_or(ChronicleError::KindMismatch {
        nid,
        expected: "concept",
        found: entity.kind(),
    })
}
