//! Metric names and log setup.
//!
//! The library only records through the `metrics` facade; wiring an exporter
//! is left to the host process.

pub const DOCUMENTS_ENQUEUED: &str = "alarm_archive_documents_enqueued_total";
pub const DOCUMENTS_DROPPED: &str = "alarm_archive_documents_dropped_total";
pub const TRANSLATION_FAILURES: &str = "alarm_archive_translation_failures_total";
pub const BULK_INSERT_SIZE: &str = "alarm_archive_bulk_insert_size";
pub const BULK_INSERT_SECONDS: &str = "alarm_archive_bulk_insert_seconds";
pub const BULK_FAILURES: &str = "alarm_archive_bulk_failures_total";
pub const BULK_RETRIES: &str = "alarm_archive_bulk_retries_total";

/// Install a `tracing` subscriber filtered by `RUST_LOG`, defaulting to
/// `alarm_archive=info`. Later calls are no-ops.
#[cfg(feature = "cli")]
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("alarm_archive=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
