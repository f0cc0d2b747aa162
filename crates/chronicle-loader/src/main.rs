// crates/chronicle-loader/src/main.rs
//
// Binary entrypoint for the Chronicle loader.
//
// Parses CLI arguments, loads configuration, initializes tracing, opens a
// session, publishes optional starter data, ingests release files in
// parallel, and closes the session with a summary.

mod config;
mod runner;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use config::IngestConfig;
use runner::{ingest_files, RunTotals};
use state::{LoadPhase, LoadStateMachine};

use chronicle_ingest::{publish_starter_data, StarterData};
use chronicle_store::Session;

/// Chronicle loader: ingests RF2 concept release files into a session.
#[derive(Parser, Debug)]
#[command(name = "chronicle-loader", version = "0.1.0", about = "Chronicle RF2 release loader")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.chronicle/loader.toml")]
    config: String,

    /// Starter-data JSON published before any release file.
    #[arg(long)]
    starter_data: Option<PathBuf>,

    /// Override the configured worker count.
    #[arg(long)]
    workers: Option<usize>,

    /// Fail the run when any row is rejected.
    #[arg(long)]
    strict: bool,

    /// Concept release files to ingest.
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = expand_tilde(&args.config);
    let loaded = IngestConfig::load(&config_path);
    let mut config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => IngestConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    // Initialize tracing subscriber for structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    match &loaded {
        Ok(_) => tracing::info!("Loaded configuration from {}", config_path),
        Err(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            config_path,
            e
        ),
    }

    tracing::info!("Chronicle loader v0.1.0");
    tracing::info!("Namespace: {}", config.namespace);
    tracing::info!("Files: {}, workers: {}", args.files.len(), config.worker_limit());

    let mut phases = LoadStateMachine::new();
    let session = Session::open(config.session_config()?)?;
    let registry = session.registry();

    phases.transition(LoadPhase::Seeding)?;
    if let Some(path) = &args.starter_data {
        let data = StarterData::load(path)?;
        let (concepts, patterns) = publish_starter_data(&*registry, &data)?;
        tracing::info!(
            "Starter data {}: {} concepts, {} patterns",
            path.display(),
            concepts.len(),
            patterns.len()
        );
    }

    phases.transition(LoadPhase::Ingesting)?;
    let outcomes = ingest_files(
        registry,
        Arc::new(config.context()),
        args.files.clone(),
        config.worker_limit(),
    )
    .await;
    let totals = RunTotals::from_outcomes(&outcomes);

    phases.transition(LoadPhase::Closing)?;
    let summary = session.close();
    tracing::info!(
        "Run complete: {} files ({} aborted), {} rows, {} accepted, {} rejected",
        totals.files,
        totals.aborted,
        totals.rows,
        totals.accepted,
        totals.rejected
    );
    tracing::info!("Summary: {}", serde_json::to_string(&summary)?);

    if totals.aborted > 0 {
        return Err(format!("{} file(s) aborted", totals.aborted).into());
    }
    if args.strict && totals.rejected > 0 {
        return Err(format!("{} row(s) rejected", totals.rejected).into());
    }
    Ok(())
}

/// Expand `~` at the start of a path to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
