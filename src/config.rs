// src/config.rs

//! Application configuration structures.
//!
//! Loaded from a TOML file with serde defaults for every field, so a partial
//! or missing file still yields a usable configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Content source API settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Object storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sync/orchestration behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Search index settings
    #[serde(default)]
    pub index: IndexConfig,

    /// Serving-cluster control plane settings
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.domain.trim().is_empty() {
            return Err(AppError::validation("source.domain is empty"));
        }
        if self.source.locales.is_empty() {
            return Err(AppError::validation("source.locales is empty"));
        }
        if !self.source.locales.contains(&self.source.primary_locale) {
            return Err(AppError::validation(
                "source.primary_locale must be one of source.locales",
            ));
        }
        if self.sync.fetch_concurrency == 0 {
            return Err(AppError::validation("sync.fetch_concurrency must be > 0"));
        }
        if self.sync.scheduled_attempts == 0 || self.sync.adhoc_attempts == 0 {
            return Err(AppError::validation("fetch attempt budgets must be > 0"));
        }
        if self.control_plane.max_polls == 0 {
            return Err(AppError::validation("control_plane.max_polls must be > 0"));
        }
        Ok(())
    }
}

/// Content source API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base domain of the content API
    #[serde(default = "defaults::domain")]
    pub domain: String,

    /// Locales to fetch for each catalogue entry
    #[serde(default = "defaults::locales")]
    pub locales: Vec<String>,

    /// Locale used for catalogue listing calls
    #[serde(default = "defaults::primary_locale")]
    pub primary_locale: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Skip TLS certificate validation on the content path.
    /// Deliberate trust decision for the proxied source environment.
    #[serde(default = "defaults::yes")]
    pub danger_accept_invalid_certs: bool,

    /// Environment variable holding the bearer token for the source API
    #[serde(default = "defaults::token_env")]
    pub token_env: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            domain: defaults::domain(),
            locales: defaults::locales(),
            primary_locale: defaults::primary_locale(),
            timeout_secs: defaults::timeout(),
            danger_accept_invalid_certs: defaults::yes(),
            token_env: defaults::token_env(),
        }
    }
}

/// Object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend selection: "local" or "s3"
    #[serde(default = "defaults::backend")]
    pub backend: String,

    /// Root directory for the local backend
    #[serde(default = "defaults::local_root")]
    pub local_root: String,

    /// Bucket for raw payloads, run state and snapshots
    #[serde(default = "defaults::bucket")]
    pub bucket: String,

    /// Bucket the serving process reads snapshots from
    #[serde(default = "defaults::serving_bucket")]
    pub serving_bucket: String,

    /// Key prefix inside the serving bucket
    #[serde(default = "defaults::serving_prefix")]
    pub serving_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: defaults::backend(),
            local_root: defaults::local_root(),
            bucket: defaults::bucket(),
            serving_bucket: defaults::serving_bucket(),
            serving_prefix: defaults::serving_prefix(),
        }
    }
}

/// Sync and orchestration behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Fan-out bound for concurrent fetch tasks.
    /// The upstream proxy resets connections under unbounded fan-out.
    #[serde(default = "defaults::fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Fetch attempt budget for scheduled (weekly) refreshes
    #[serde(default = "defaults::scheduled_attempts")]
    pub scheduled_attempts: u32,

    /// Fetch attempt budget for ad-hoc runs
    #[serde(default = "defaults::adhoc_attempts")]
    pub adhoc_attempts: u32,

    /// Fixed delay between fetch attempts, in seconds (no backoff)
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_secs: u64,

    /// Period of the scheduled refresh loop, in days
    #[serde(default = "defaults::schedule_period_days")]
    pub schedule_period_days: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: defaults::fetch_concurrency(),
            scheduled_attempts: defaults::scheduled_attempts(),
            adhoc_attempts: defaults::adhoc_attempts(),
            retry_delay_secs: defaults::retry_delay(),
            schedule_period_days: defaults::schedule_period_days(),
        }
    }
}

/// Search index settings passed through to the index collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Embedding model identifier
    #[serde(default = "defaults::embedding_model")]
    pub embedding_model: String,

    /// Embedding vector dimensions
    #[serde(default = "defaults::embedding_dimensions")]
    pub embedding_dimensions: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            embedding_model: defaults::embedding_model(),
            embedding_dimensions: defaults::embedding_dimensions(),
        }
    }
}

/// Serving-cluster control plane settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// Endpoint that stops the serving instances
    #[serde(default)]
    pub stop_url: String,

    /// Endpoint that starts the serving instances
    #[serde(default)]
    pub start_url: String,

    /// Response header carrying the operation-status URL
    #[serde(default = "defaults::operation_header")]
    pub operation_header: String,

    /// Fixed interval between status polls, in seconds
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum number of status polls before giving up
    #[serde(default = "defaults::max_polls")]
    pub max_polls: u32,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            stop_url: String::new(),
            start_url: String::new(),
            operation_header: defaults::operation_header(),
            poll_interval_secs: defaults::poll_interval(),
            max_polls: defaults::max_polls(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Emit JSON-formatted log lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            json: false,
        }
    }
}

mod defaults {
    pub fn domain() -> String {
        "https://plus-test.ssc-spc.gc.ca".to_string()
    }

    pub fn locales() -> Vec<String> {
        vec!["en".to_string(), "fr".to_string()]
    }

    pub fn primary_locale() -> String {
        "en".to_string()
    }

    pub fn timeout() -> u64 {
        30
    }

    pub fn yes() -> bool {
        true
    }

    pub fn token_env() -> String {
        "PLUS_SYNC_TOKEN".to_string()
    }

    pub fn backend() -> String {
        "local".to_string()
    }

    pub fn local_root() -> String {
        "data/store".to_string()
    }

    pub fn bucket() -> String {
        "plus-sync-data".to_string()
    }

    pub fn serving_bucket() -> String {
        "plus-sync-serving".to_string()
    }

    pub fn serving_prefix() -> String {
        "indices/latest".to_string()
    }

    pub fn fetch_concurrency() -> usize {
        16
    }

    pub fn scheduled_attempts() -> u32 {
        5
    }

    pub fn adhoc_attempts() -> u32 {
        3
    }

    pub fn retry_delay() -> u64 {
        3
    }

    pub fn schedule_period_days() -> u64 {
        7
    }

    pub fn embedding_model() -> String {
        "text-embedding-ada-002".to_string()
    }

    pub fn embedding_dimensions() -> usize {
        1536
    }

    pub fn operation_header() -> String {
        "operation-location".to_string()
    }

    pub fn poll_interval() -> u64 {
        10
    }

    pub fn max_polls() -> u32 {
        30
    }

    pub fn log_level() -> String {
        "info".to_string()
    }
}
