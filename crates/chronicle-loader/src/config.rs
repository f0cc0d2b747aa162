// crates/chronicle-loader/src/config.rs
//
// Runtime configuration for the Chronicle loader.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::fs;
use uuid::Uuid;

use chronicle_core::error::ChronicleError;
use chronicle_core::identity::uuid_for_sctid;
use chronicle_core::well_known::{WellKnown, SNOMED_NAMESPACE};
use chronicle_ingest::{parse_sctid, IngestContext};
use chronicle_store::identity::DEFAULT_SHARD_AMOUNT;
use chronicle_store::SessionConfig;

/// Runtime configuration for a load.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Namespace for SCTID- and STAMP-derived UUIDs.
    #[serde(default = "default_namespace")]
    pub namespace: Uuid,

    /// Author concept recorded on every row stamp.
    #[serde(default = "default_author")]
    pub author: Uuid,

    /// Path concept recorded on every row stamp.
    #[serde(default = "default_path")]
    pub path: Uuid,

    /// When set, every stamp is recorded under this module instead of the
    /// row's `moduleId` (e.g. the text module UUID).
    #[serde(default)]
    pub module_override: Option<Uuid>,

    /// SCTIDs of module concepts seeded when the session opens.
    #[serde(default)]
    pub known_modules: Vec<String>,

    /// Shard count for the concurrent maps. Rounded up to a power of two.
    #[serde(default = "default_shard_amount")]
    pub shard_amount: usize,

    /// Maximum number of files ingested at once.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_namespace() -> Uuid {
    SNOMED_NAMESPACE
}

fn default_author() -> Uuid {
    WellKnown::TerminologyAuthor.uuid()
}

fn default_path() -> Uuid {
    WellKnown::DevelopmentPath.uuid()
}

fn default_shard_amount() -> usize {
    DEFAULT_SHARD_AMOUNT
}

fn default_workers() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            author: default_author(),
            path: default_path(),
            module_override: None,
            known_modules: Vec::new(),
            shard_amount: default_shard_amount(),
            workers: default_workers(),
            log_level: default_log_level(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: IngestConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Provenance every row is ingested under.
    pub fn context(&self) -> IngestContext {
        IngestContext {
            namespace: self.namespace,
            author: self.author,
            path: self.path,
            module_override: self.module_override,
        }
    }

    /// Session settings, with each known module mapped to its SCTID UUID.
    pub fn session_config(&self) -> Result<SessionConfig, ChronicleError> {
        let bootstrap_concepts = self
            .known_modules
            .iter()
            .map(|sctid| {
                parse_sctid("known_modules", sctid.trim())
                    .map(|sctid| uuid_for_sctid(&self.namespace, &sctid))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SessionConfig {
            shard_amount: self.shard_amount,
            bootstrap_concepts,
        })
    }

    /// Worker count, never less than one.
    pub fn worker_limit(&self) -> usize {
        self.workers.max(1)
    }
}
