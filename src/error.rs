use thiserror::Error;

use crate::bulk::BulkFailure;

/// Application level error type used throughout the crate.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O related failure
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error while parsing YAML configuration files
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Error while encoding or decoding documents
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport failure talking to the document store
    #[cfg(feature = "elastic")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The document store answered with an unexpected status
    #[error("Store returned status {status}: {body}")]
    Store { status: u16, body: String },

    /// The writer was stopped and cannot be started again
    #[error("Already stopped")]
    AlreadyStopped,

    /// The ingest queue had no room; the document was dropped
    #[error("Ingest queue full (capacity {0})")]
    QueueFull(usize),

    /// The consumer side of the ingest queue is gone
    #[error("Ingest queue closed")]
    QueueClosed,

    /// One or more documents in a bulk request were not written
    #[error(transparent)]
    Bulk(#[from] BulkFailure),

    /// No alarm of the requested kind existed at the given time
    #[error("No {kind} alarms at time: {time}")]
    NoAlarmAtTime { kind: &'static str, time: i64 },

    /// A lifecycle callback carried data the translator cannot map
    #[error("Translation error: {0}")]
    Translation(String),
}

/// Convenient alias over [`Result`] using [`ArchiveError`]
pub type Result<T> = std::result::Result<T, ArchiveError>;
