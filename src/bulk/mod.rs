//! Bulk upserts against the document store.
//!
//! Every document patch becomes one upsert action merging its snapshot
//! fields and, when it carries change-log entries, one scripted update
//! appending those entries to the stored arrays. Appending server-side
//! keeps concurrent patches of the same alarm from overwriting each other's
//! history.
//!
//! A batch can partially succeed. Callers get a [`BulkFailure`] naming the
//! documents that did not land; their siblings may already be durable.

use async_trait::async_trait;
use thiserror::Error;

use crate::document::AlarmDocument;

pub mod request;

#[cfg(feature = "elastic")]
pub mod elastic;

#[cfg(feature = "elastic")]
pub use elastic::ElasticClient;

/// A document from a batch that was not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    /// Position of the document in the submitted batch
    pub position: usize,
    pub id: i32,
    pub reduction_key: String,
    pub index: String,
    /// Item status reported by the store; `None` when the request itself failed
    pub status: Option<u16>,
    pub reason: String,
}

/// Structured bulk failure listing exactly the documents that did not land.
#[derive(Debug, Clone, Error)]
#[error("{message} ({} of {total} documents failed after {attempts} attempts)", .failed.len())]
pub struct BulkFailure {
    pub message: String,
    pub attempts: u32,
    pub total: usize,
    pub failed: Vec<FailedItem>,
}

impl BulkFailure {
    pub fn failed_ids(&self) -> Vec<i32> {
        self.failed.iter().map(|f| f.id).collect()
    }
}

/// Sink for batches of document patches.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BulkUpsertClient: Send + Sync {
    /// Write a batch in order, retrying per the client's policy.
    async fn bulk_upsert(&self, documents: Vec<AlarmDocument>) -> Result<(), BulkFailure>;
}

