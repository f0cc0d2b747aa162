// crates/chronicle-loader/src/runner.rs
//
// Parallel file ingestion. Each file is ingested on the blocking pool; a
// semaphore bounds how many run at once. All files share one registry.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info};

use chronicle_core::error::ChronicleError;
use chronicle_ingest::{ingest_concept_file, IngestContext, IngestReport};
use chronicle_store::InMemoryRegistry;

/// Result of ingesting one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<IngestReport, ChronicleError>,
}

/// Totals across every file of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunTotals {
    pub files: usize,
    pub aborted: usize,
    pub rows: usize,
    pub accepted: usize,
    pub rejected: usize,
}

impl RunTotals {
    pub fn from_outcomes(outcomes: &[FileOutcome]) -> Self {
        let mut totals = RunTotals {
            files: outcomes.len(),
            ..RunTotals::default()
        };
        for outcome in outcomes {
            match &outcome.result {
                Ok(report) => {
                    totals.rows += report.rows;
                    totals.accepted += report.accepted;
                    totals.rejected += report.rejected.len();
                }
                Err(_) => totals.aborted += 1,
            }
        }
        totals
    }
}

/// Ingest `files` with at most `workers` running at once.
///
/// Outcomes are returned in input order.
pub async fn ingest_files(
    registry: Arc<InMemoryRegistry>,
    ctx: Arc<IngestContext>,
    files: Vec<PathBuf>,
    workers: usize,
) -> Vec<FileOutcome> {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut handles = Vec::with_capacity(files.len());

    for path in files {
        let semaphore = semaphore.clone();
        let registry = registry.clone();
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            // The semaphore is never closed, so acquire only fails on shutdown.
            let _permit = semaphore.acquire_owned().await.ok();
            let task_path = path.clone();
            let result = tokio::task::spawn_blocking(move || {
                ingest_concept_file(&*registry, &ctx, &task_path)
            })
            .await
            .unwrap_or_else(|e| {
                Err(ChronicleError::Io(format!(
                    "ingest task for {} failed: {}",
                    path.display(),
                    e
                )))
            });
            FileOutcome { path, result }
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(outcome) => {
                log_outcome(&outcome);
                outcomes.push(outcome);
            }
            Err(e) => error!("Ingest task panicked: {}", e),
        }
    }
    outcomes
}

fn log_outcome(outcome: &FileOutcome) {
    match &outcome.result {
        Ok(report) => info!(
            "{}: {} accepted, {} rejected",
            outcome.path.display(),
            report.accepted,
            report.rejected.len()
        ),
        Err(e) => error!("{}: aborted: {}", outcome.path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chronicle_core::identity::uuid_for_sctid;
    use chronicle_core::traits::{EntityRegistry, IdentityService};
    use chronicle_core::well_known::SNOMED_NAMESPACE;
    use chronicle_store::{Session, SessionConfig};
    use uuid::Uuid;

    /// Write a release file under the temp dir with a unique name.
    fn temp_release(label: &str, rows: &[String]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "chronicle_test_{}_{}.txt",
            label,
            Uuid::new_v4()
        ));
        let mut text = String::from("id\teffectiveTime\tactive\tmoduleId\tdefinitionStatusId\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        std::fs::write(&path, text).unwrap();
        path
    }

    fn rows(start: u64, count: u64) -> Vec<String> {
        (start..start + count)
            .map(|id| format!("{}\t20220901\t1\t731000124108\t900000000000074008", id))
            .collect()
    }

    fn open_session() -> Session {
        Session::open(SessionConfig {
            bootstrap_concepts: vec![uuid_for_sctid(&SNOMED_NAMESPACE, "731000124108")],
            ..SessionConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_files_ingest_in_parallel() {
        let session = open_session();
        let registry = session.registry();
        let files = vec![
            temp_release("a", &rows(100_000_000, 50)),
            temp_release("b", &rows(100_000_050, 50)),
            // Overlaps both of the above.
            temp_release("c", &rows(100_000_025, 50)),
        ];

        let outcomes = ingest_files(
            registry.clone(),
            Arc::new(IngestContext::default()),
            files.clone(),
            2,
        )
        .await;
        let totals = RunTotals::from_outcomes(&outcomes);
        assert_eq!(totals.files, 3);
        assert_eq!(totals.accepted, 150);
        assert_eq!(totals.aborted, 0);
        for (outcome, path) in outcomes.iter().zip(&files) {
            assert_eq!(&outcome.path, path);
        }

        // 100 distinct concepts, each with exactly one version.
        let snapshot = registry.snapshot();
        for id in 100_000_000u64..100_000_100 {
            let uuid = uuid_for_sctid(&SNOMED_NAMESPACE, &id.to_string());
            let nid = registry.nid_if_known(&[uuid]).unwrap();
            assert_eq!(snapshot.get(nid).unwrap().version_count(), 1);
        }

        for path in files {
            let _ = std::fs::remove_file(path);
        }
    }

    #[tokio::test]
    async fn test_missing_file_aborts_only_that_file() {
        let session = open_session();
        let good = temp_release("good", &rows(200_000_000, 3));
        let missing = std::env::temp_dir().join(format!("chronicle_missing_{}.txt", Uuid::new_v4()));

        let outcomes = ingest_files(
            session.registry(),
            Arc::new(IngestContext::default()),
            vec![missing, good.clone()],
            4,
        )
        .await;
        assert!(matches!(outcomes[0].result, Err(ChronicleError::Io(_))));
        let totals = RunTotals::from_outcomes(&outcomes);
        assert_eq!((totals.aborted, totals.accepted), (1, 3));

        let _ = std::fs::remove_file(good);
    }
}
