//! Single consumer that batches queued documents into bulk requests.
//!
//! A batch starts with a blocking take, grabs whatever is already queued,
//! then keeps polling until either `batch_size` documents are collected or
//! `max_fill_wait` has passed since the first one arrived. Flush failures are
//! logged and the loop carries on with the next batch.
//!
//! A stop request is checked before every wait. A flush already in flight
//! runs to completion; no new batch is taken afterwards.

use metrics::histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::bulk::BulkUpsertClient;
use crate::document::AlarmDocument;
use crate::error::{ArchiveError, Result};
use crate::queue::IngestReceiver;
use crate::telemetry::BULK_INSERT_SIZE;

/// Counters shared between the worker and observers.
#[derive(Debug, Default)]
pub struct WriterStats {
    batches_flushed: AtomicU64,
    documents_flushed: AtomicU64,
    failed_flushes: AtomicU64,
}

impl WriterStats {
    pub fn batches_flushed(&self) -> u64 {
        self.batches_flushed.load(Ordering::Relaxed)
    }

    pub fn documents_flushed(&self) -> u64 {
        self.documents_flushed.load(Ordering::Relaxed)
    }

    pub fn failed_flushes(&self) -> u64 {
        self.failed_flushes.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub max_fill_wait: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 200,
            max_fill_wait: Duration::from_millis(500),
        }
    }
}

pub struct BatchingWriter {
    settings: BatchSettings,
    receiver: Mutex<Option<IngestReceiver>>,
    client: Arc<dyn BulkUpsertClient>,
    stats: Arc<WriterStats>,
    stopped: AtomicBool,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    // The worker owns the sender; receivers see it close when the task ends
    exit_tx: Mutex<Option<watch::Sender<()>>>,
    exited: watch::Receiver<()>,
}

impl BatchingWriter {
    pub fn new(settings: BatchSettings, receiver: IngestReceiver, client: Arc<dyn BulkUpsertClient>) -> Self {
        let (exit_tx, exited) = watch::channel(());
        Self {
            settings: BatchSettings {
                batch_size: settings.batch_size.max(1),
                ..settings
            },
            receiver: Mutex::new(Some(receiver)),
            client,
            stats: Arc::new(WriterStats::default()),
            stopped: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
            exit_tx: Mutex::new(Some(exit_tx)),
            exited,
        }
    }

    pub fn stats(&self) -> Arc<WriterStats> {
        self.stats.clone()
    }

    /// True while the worker task is alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Launch the worker. Starting a running writer is a no-op; starting a
    /// stopped one fails.
    pub fn start(&self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ArchiveError::AlreadyStopped);
        }
        let Some(receiver) = self.receiver.lock().take() else {
            return Ok(());
        };
        let Some(exit_tx) = self.exit_tx.lock().take() else {
            return Err(ArchiveError::AlreadyStopped);
        };

        let worker = Worker {
            settings: self.settings,
            receiver,
            client: self.client.clone(),
            stats: self.stats.clone(),
            cancel: self.cancel.clone(),
            _exit_tx: exit_tx,
        };
        *self.handle.lock() = Some(tokio::spawn(worker.run()));
        info!(
            "Batching writer started (batch size {}, max fill wait {:?})",
            self.settings.batch_size, self.settings.max_fill_wait
        );
        Ok(())
    }

    /// Stop the worker and wait for it to exit. Documents still queued are
    /// discarded. Safe to call more than once, including concurrently: every
    /// call returns only after the worker has terminated.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.cancel.cancel();

        // Never started: nobody else will close the exit channel
        drop(self.exit_tx.lock().take());

        let mut exited = self.exited.clone();
        while exited.changed().await.is_ok() {}

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Batching writer task ended abnormally: {}", e);
            }
            info!("Batching writer stopped");
        }
    }
}

struct Worker {
    settings: BatchSettings,
    receiver: IngestReceiver,
    client: Arc<dyn BulkUpsertClient>,
    stats: Arc<WriterStats>,
    cancel: CancellationToken,
    _exit_tx: watch::Sender<()>,
}

impl Worker {
    async fn run(mut self) {
        let cancel = self.cancel.clone();
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let first = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                doc = self.receiver.take() => match doc {
                    Some(doc) => doc,
                    None => {
                        debug!("Ingest queue closed, writer exiting");
                        break;
                    }
                },
            };

            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                batch = self.fill(first) => batch,
            };

            self.flush(batch).await;
        }
    }

    async fn fill(&mut self, first: AlarmDocument) -> Vec<AlarmDocument> {
        let max = self.settings.batch_size;
        let started = Instant::now();
        let mut batch = Vec::with_capacity(max);
        batch.push(first);

        let room = max - batch.len();
        self.receiver.drain_to(&mut batch, room);

        while batch.len() < max {
            let remaining = self.settings.max_fill_wait.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            match self.receiver.poll(remaining).await {
                Some(doc) => {
                    batch.push(doc);
                    let room = max - batch.len();
                    self.receiver.drain_to(&mut batch, room);
                }
                None => break,
            }
        }
        batch
    }

    async fn flush(&self, batch: Vec<AlarmDocument>) {
        let size = batch.len();
        histogram!(BULK_INSERT_SIZE).record(size as f64);

        match self.client.bulk_upsert(batch).await {
            Ok(()) => {
                self.stats.documents_flushed.fetch_add(size as u64, Ordering::Relaxed);
                debug!("Flushed {} documents", size);
            }
            Err(failure) => {
                self.stats.failed_flushes.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .documents_flushed
                    .fetch_add((size - failure.failed.len().min(size)) as u64, Ordering::Relaxed);
                error!("Failed to flush {} documents: {}", size, failure);
                for item in &failure.failed {
                    debug!(
                        "Unwritten alarm {} ({}) -> {}: {}",
                        item.id, item.reduction_key, item.index, item.reason
                    );
                }
            }
        }
        self.stats.batches_flushed.fetch_add(1, Ordering::Relaxed);
    }
}
