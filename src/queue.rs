//! Bounded FIFO between alarm lifecycle producers and the batching writer.
//!
//! Producers never wait: when the queue is full the document is dropped,
//! counted and logged, and the producer carries on.

use metrics::counter;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{trace, warn};

use crate::document::AlarmDocument;
use crate::error::{ArchiveError, Result};
use crate::telemetry::{DOCUMENTS_DROPPED, DOCUMENTS_ENQUEUED};

/// Create a queue holding at most `capacity` documents.
pub fn ingest_queue(capacity: usize) -> (IngestQueue, IngestReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        IngestQueue {
            tx,
            capacity: capacity.max(1),
        },
        IngestReceiver { rx },
    )
}

/// Producer handle. Cheap to clone; every clone feeds the same queue.
#[derive(Debug, Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<AlarmDocument>,
    capacity: usize,
}

impl IngestQueue {
    /// Enqueue without blocking. A full queue drops the document.
    pub fn offer(&self, doc: AlarmDocument) -> Result<()> {
        let id = doc.id;
        match self.tx.try_send(doc) {
            Ok(()) => {
                counter!(DOCUMENTS_ENQUEUED).increment(1);
                trace!("Queued document for alarm {}", id);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                counter!(DOCUMENTS_DROPPED).increment(1);
                warn!(
                    "Ingest queue full ({} documents), dropping document for alarm {}",
                    self.capacity, id
                );
                Err(ArchiveError::QueueFull(self.capacity))
            }
            Err(TrySendError::Closed(_)) => {
                counter!(DOCUMENTS_DROPPED).increment(1);
                warn!("Ingest queue closed, dropping document for alarm {}", id);
                Err(ArchiveError::QueueClosed)
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Documents currently waiting.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer handle, owned by the single writer.
#[derive(Debug)]
pub struct IngestReceiver {
    rx: mpsc::Receiver<AlarmDocument>,
}

impl IngestReceiver {
    /// Wait for the next document. `None` once every producer is gone.
    pub async fn take(&mut self) -> Option<AlarmDocument> {
        self.rx.recv().await
    }

    /// Wait up to `timeout` for the next document.
    pub async fn poll(&mut self, timeout: Duration) -> Option<AlarmDocument> {
        tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten()
    }

    /// Move up to `max` already-queued documents into `batch` without waiting.
    pub fn drain_to(&mut self, batch: &mut Vec<AlarmDocument>, max: usize) -> usize {
        let mut moved = 0;
        while moved < max {
            match self.rx.try_recv() {
                Ok(doc) => {
                    batch.push(doc);
                    moved += 1;
                }
                Err(_) => break,
            }
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn doc(id: i32) -> AlarmDocument {
        AlarmDocument::new(id, format!("rk-{id}"), 0)
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let (queue, mut rx) = ingest_queue(2);
        queue.offer(doc(1)).unwrap();
        queue.offer(doc(2)).unwrap();
        assert_eq!(queue.len(), 2);

        let started = Instant::now();
        let err = queue.offer(doc(3)).unwrap_err();
        assert!(matches!(err, ArchiveError::QueueFull(2)));
        assert!(started.elapsed() < Duration::from_millis(50));

        let mut batch = Vec::new();
        assert_eq!(rx.drain_to(&mut batch, 10), 2);
        assert_eq!(batch.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_drain_respects_limit() {
        let (queue, mut rx) = ingest_queue(10);
        for id in 0..5 {
            queue.offer(doc(id)).unwrap();
        }
        let mut batch = Vec::new();
        assert_eq!(rx.drain_to(&mut batch, 3), 3);
        assert_eq!(rx.take().await.unwrap().id, 3);
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let (_queue, mut rx) = ingest_queue(1);
        assert!(rx.poll(Duration::from_millis(10)).await.is_none());
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (queue, rx) = ingest_queue(1);
        drop(rx);
        assert!(matches!(queue.offer(doc(1)), Err(ArchiveError::QueueClosed)));
    }
}
