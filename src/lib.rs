//! alarm-archive - Alarm history archiving for Elasticsearch
//!
//! Projects a live alarm lifecycle into append-only documents in an external
//! index and reconstructs any alarm's state as of a past timestamp.
//!
//! Data flows one way through the pipeline:
//!
//! ```text
//! lifecycle callback -> DocumentTranslator -> IngestQueue -> BatchingWriter -> BulkUpsertClient
//! ```
//!
//! and back out through [`reader::AlarmsFromStore`] into the point-in-time
//! views of [`view`].
//!
//! # Feature Flags
//!
//! - `elastic` (default): reqwest-based Elasticsearch client
//! - `cli` (default): the `alarm-archive` admin binary and log setup
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use alarm_archive::{AlarmArchiver, AlarmEntityListener, ArchiveConfig, ElasticClient, model::Alarm};
//!
//! # async fn run() -> alarm_archive::Result<()> {
//! let config = ArchiveConfig::from_file("archive.yaml")?;
//! let client = Arc::new(ElasticClient::new(&config)?);
//! let archiver = AlarmArchiver::from_config(&config, client);
//! archiver.start()?;
//!
//! archiver.on_alarm_created(&Alarm::new(1, "uei.opennms.org/nodes/nodeDown::1", 0));
//!
//! archiver.stop().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// CORE MODULES
// ============================================================================

pub mod clock;
pub mod config;
pub mod error;
pub mod telemetry;

// ============================================================================
// DOCUMENT MODEL
// ============================================================================

pub mod document;
pub mod index;
pub mod model;

// ============================================================================
// WRITE PATH
// ============================================================================

pub mod archiver;
pub mod bulk;
pub mod node_cache;
pub mod queue;
pub mod translator;
pub mod writer;

// ============================================================================
// READ PATH
// ============================================================================

pub mod reader;
pub mod view;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use archiver::{AlarmArchiver, AlarmEntityListener};
pub use bulk::{BulkFailure, BulkUpsertClient, FailedItem};
pub use clock::{Clock, PseudoClock, SystemClock};
pub use config::ArchiveConfig;
pub use document::AlarmDocument;
pub use error::{ArchiveError, Result};
pub use index::IndexStrategy;
pub use queue::{ingest_queue, IngestQueue, IngestReceiver};
pub use reader::AlarmsFromStore;
pub use translator::DocumentTranslator;
pub use view::{AlarmDocumentView, AlarmTableView};
pub use writer::{BatchSettings, BatchingWriter, WriterStats};

#[cfg(feature = "elastic")]
pub use bulk::ElasticClient;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
