// crates/chronicle-ingest/src/batch.rs
//
// Batch ingestion of concept release files, one row at a time in file order.
//
// Row-level failures (malformed rows, unresolved references, stamp
// conflicts) are recorded and skipped. Anything else is an invariant
// violation and aborts the batch.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use chronicle_core::error::ChronicleError;
use chronicle_core::traits::EntityRegistry;

use crate::context::IngestContext;
use crate::rf2::ReleaseSchema;
use crate::transform::create_concept_chronology;

/// A row that was rejected, with its 1-based line number.
#[derive(Debug, Clone, Serialize)]
pub struct RowRejection {
    pub line: usize,
    pub reason: String,
}

/// Outcome of ingesting one source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub source: String,
    /// Data rows seen (header and blank lines excluded).
    pub rows: usize,
    pub accepted: usize,
    pub rejected: Vec<RowRejection>,
}

impl IngestReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Ingest concept rows from an iterator of lines.
pub fn ingest_concept_lines<R, I, S>(
    registry: &R,
    ctx: &IngestContext,
    source: &str,
    lines: I,
) -> Result<IngestReport, ChronicleError>
where
    R: EntityRegistry + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut report = IngestReport::new(source);
    for (index, line) in lines.into_iter().enumerate() {
        ingest_line(registry, ctx, index + 1, line.as_ref(), &mut report)?;
    }
    log_report(&report);
    Ok(report)
}

/// Ingest an in-memory concept file.
pub fn ingest_concept_text<R: EntityRegistry + ?Sized>(
    registry: &R,
    ctx: &IngestContext,
    source: &str,
    text: &str,
) -> Result<IngestReport, ChronicleError> {
    ingest_concept_lines(registry, ctx, source, text.lines())
}

/// Stream a concept release file from disk, one line in memory at a time.
pub fn ingest_concept_file<R: EntityRegistry + ?Sized>(
    registry: &R,
    ctx: &IngestContext,
    path: &Path,
) -> Result<IngestReport, ChronicleError> {
    let file = File::open(path)
        .map_err(|e| ChronicleError::Io(format!("Failed to open {}: {}", path.display(), e)))?;
    let mut report = IngestReport::new(path.display().to_string());
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        ingest_line(registry, ctx, index + 1, &line, &mut report)?;
    }
    log_report(&report);
    Ok(report)
}

/// Apply one line, recording a row-level rejection in `report`.
fn ingest_line<R: EntityRegistry + ?Sized>(
    registry: &R,
    ctx: &IngestContext,
    line_no: usize,
    line: &str,
    report: &mut IngestReport,
) -> Result<(), ChronicleError> {
    if line.trim().is_empty() || ReleaseSchema::CONCEPT.is_header(line) {
        return Ok(());
    }
    report.rows += 1;
    match create_concept_chronology(registry, ctx, line) {
        Ok(_) => report.accepted += 1,
        Err(e) if e.is_row_level() => {
            warn!("{}:{}: row rejected: {}", report.source, line_no, e);
            report.rejected.push(RowRejection {
                line: line_no,
                reason: e.to_string(),
            });
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

fn log_report(report: &IngestReport) {
    info!(
        "Ingested {}: {} rows, {} accepted, {} rejected",
        report.source,
        report.rows,
        report.accepted,
        report.rejected.len()
    );
}
