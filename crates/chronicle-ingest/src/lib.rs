// crates/chronicle-ingest/src/lib.rs
//
// chronicle-ingest: turns RF2 release rows and starter-data documents into
// Chronicle chronologies.
//
// Rows are parsed against a release schema, every referenced concept is
// resolved without allocation, and only then are the row's stamp and concept
// published through the registry. Batch ingestion records row-level
// rejections and keeps going.

pub mod batch;
pub mod context;
pub mod rf2;
pub mod starter;
pub mod transform;

pub use batch::{
    ingest_concept_file, ingest_concept_lines, ingest_concept_text, IngestReport, RowRejection,
};
pub use context::IngestContext;
pub use rf2::{parse_sctid, ReleaseSchema, Rf2Row};
pub use starter::{publish_starter_data, reference_uuid, StarterData};
pub use transform::{
    concept_for_row, create_concept_chronology, create_stamp_chronology, stamp_for_row,
};
