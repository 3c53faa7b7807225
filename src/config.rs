// src/config.rs - Archiver configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ArchiveError, Result};
use crate::index::IndexStrategy;

// ============================================================================
// MAIN CONFIGURATION
// ============================================================================

/// Alarm archiver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Base URL of the document store
    #[serde(default = "default_elastic_url")]
    pub elastic_url: String,

    /// Basic-auth user
    #[serde(default)]
    pub username: Option<String>,

    /// Basic-auth password
    #[serde(default)]
    pub password: Option<String>,

    /// Prefix of every index the archiver writes to
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,

    /// Index partition granularity
    #[serde(default)]
    pub index_strategy: IndexStrategy,

    /// Attempts after the first one before a bulk request is given up
    #[serde(default = "default_bulk_retry_count")]
    pub bulk_retry_count: u32,

    /// Base delay between bulk retries; grows linearly with the attempt
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Maximum documents per bulk request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Longest time a batch keeps filling after its first document
    #[serde(default = "default_max_fill_wait_ms")]
    pub max_fill_wait_ms: u64,

    /// Ingest queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-request timeout against the store
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Upper bound on cached node summaries
    #[serde(default = "default_node_cache_max_entries")]
    pub node_cache_max_entries: usize,

    /// Stamp documents from a pseudo clock instead of wall time
    #[serde(default)]
    pub use_pseudo_clock: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            elastic_url: default_elastic_url(),
            username: None,
            password: None,
            index_prefix: default_index_prefix(),
            index_strategy: IndexStrategy::default(),
            bulk_retry_count: default_bulk_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            batch_size: default_batch_size(),
            max_fill_wait_ms: default_max_fill_wait_ms(),
            queue_capacity: default_queue_capacity(),
            request_timeout_ms: default_request_timeout_ms(),
            node_cache_max_entries: default_node_cache_max_entries(),
            use_pseudo_clock: false,
        }
    }
}

impl ArchiveConfig {
    /// Load and validate a YAML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ArchiveError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate YAML configuration
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ArchiveConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ArchiveError::Config("batch_size must be greater than 0".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ArchiveError::Config("queue_capacity must be greater than 0".into()));
        }
        if self.max_fill_wait_ms == 0 {
            return Err(ArchiveError::Config("max_fill_wait_ms must be greater than 0".into()));
        }
        if self.index_prefix.trim().is_empty() {
            return Err(ArchiveError::Config("index_prefix must not be empty".into()));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ArchiveError::Config("password given without username".into()));
        }
        Ok(())
    }

    pub fn max_fill_wait(&self) -> Duration {
        Duration::from_millis(self.max_fill_wait_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ============================================================================
// DEFAULTS
// ============================================================================

fn default_elastic_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index_prefix() -> String {
    "opennms-alarms".to_string()
}

fn default_bulk_retry_count() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_batch_size() -> usize {
    200
}

fn default_max_fill_wait_ms() -> u64 {
    500
}

fn default_queue_capacity() -> usize {
    100
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_node_cache_max_entries() -> usize {
    10_000
}
