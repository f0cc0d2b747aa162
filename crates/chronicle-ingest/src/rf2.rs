// crates/chronicle-ingest/src/rf2.rs
//
// RF2 release rows: tab-delimited lines with a fixed per-file schema.
//
//   id  effectiveTime  active  moduleId  <type-specific columns...>
//
// Parsing is pure: a row either parses completely or is rejected with
// `MalformedRow`; nothing here touches the registry.

use chronicle_core::error::ChronicleError;
use chronicle_core::time::parse_effective_time;

/// Column layout of one kind of release file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseSchema {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl ReleaseSchema {
    /// `sct2_Concept_*` files.
    pub const CONCEPT: ReleaseSchema = ReleaseSchema {
        name: "concept",
        columns: &["id", "effectiveTime", "active", "moduleId", "definitionStatusId"],
    };

    /// `sct2_Description_*` files.
    pub const DESCRIPTION: ReleaseSchema = ReleaseSchema {
        name: "description",
        columns: &[
            "id",
            "effectiveTime",
            "active",
            "moduleId",
            "conceptId",
            "languageCode",
            "typeId",
            "term",
            "caseSignificanceId",
        ],
    };

    /// `sct2_StatedRelationship_*` / `sct2_Relationship_*` files.
    pub const RELATIONSHIP: ReleaseSchema = ReleaseSchema {
        name: "relationship",
        columns: &[
            "id",
            "effectiveTime",
            "active",
            "moduleId",
            "sourceId",
            "destinationId",
            "relationshipGroup",
            "typeId",
            "characteristicTypeId",
            "modifierId",
        ],
    };

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether `line` is this schema's header row.
    pub fn is_header(&self, line: &str) -> bool {
        let mut fields = line.trim_end_matches(['\r', '\n']).split('\t');
        self.columns.iter().all(|column| fields.next() == Some(*column)) && fields.next().is_none()
    }
}

/// One parsed release row. Shared leading columns are typed; the
/// type-specific trailing columns are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rf2Row {
    pub id: String,
    /// `effectiveTime` as written (`YYYYMMDD`).
    pub effective_date: String,
    /// `effectiveTime` as epoch milliseconds.
    pub time: i64,
    pub active: bool,
    pub module_id: String,
    pub trailing: Vec<String>,
}

impl Rf2Row {
    /// Parse one line against `schema`.
    pub fn parse(line: &str, schema: &ReleaseSchema) -> Result<Self, ChronicleError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != schema.column_count() {
            return Err(ChronicleError::MalformedRow(format!(
                "{} row has {} columns, expected {}",
                schema.name,
                fields.len(),
                schema.column_count()
            )));
        }

        let id = parse_sctid("id", fields[0])?;
        let time = parse_effective_time(fields[1])?;
        let active = match fields[2] {
            "1" => true,
            "0" => false,
            other => {
                return Err(ChronicleError::MalformedRow(format!(
                    "active flag '{}' is not 0 or 1",
                    other
                )))
            }
        };
        let module_id = parse_sctid("moduleId", fields[3])?;

        Ok(Self {
            id,
            effective_date: fields[1].to_string(),
            time,
            active,
            module_id,
            trailing: fields[4..].iter().map(|f| f.to_string()).collect(),
        })
    }
}

/// SNOMED CT identifiers are 6 to 18 decimal digits.
pub fn parse_sctid(column: &str, raw: &str) -> Result<String, ChronicleError> {
    if (6..=18).contains(&raw.len()) && raw.bytes().all(|b| b.is_ascii_digit()) {
        Ok(raw.to_string())
    } else {
        Err(ChronicleError::MalformedRow(format!(
            "{} '{}' is not an SCTID",
            column, raw
        )))
    }
}
