//! Alarm lifecycle listener feeding the archive pipeline.
//!
//! Callbacks run on the caller's thread and never block: each one translates
//! the change into a document patch and offers it to the ingest queue. A
//! patch that cannot be translated or queued is logged and dropped.

use metrics::counter;
use std::sync::Arc;
use tracing::{error, trace};

use crate::bulk::BulkUpsertClient;
use crate::clock::{Clock, PseudoClock, SystemClock};
use crate::config::ArchiveConfig;
use crate::document::AlarmDocument;
use crate::error::{ArchiveError, Result};
use crate::model::{Alarm, Memo, Severity};
use crate::node_cache::NodeCache;
use crate::queue::{ingest_queue, IngestQueue};
use crate::telemetry::TRANSLATION_FAILURES;
use crate::translator::DocumentTranslator;
use crate::writer::{BatchSettings, BatchingWriter, WriterStats};

/// Callbacks raised by the alarm domain as alarms change.
pub trait AlarmEntityListener: Send + Sync {
    fn on_alarm_created(&self, alarm: &Alarm);

    fn on_alarm_updated_with_reduced_event(&self, alarm: &Alarm, before: &Alarm);

    fn on_alarm_acknowledged(&self, alarm: &Alarm, previous_ack_user: Option<&str>, previous_ack_time: Option<i64>);

    fn on_alarm_unacknowledged(&self, alarm: &Alarm, previous_ack_user: Option<&str>, previous_ack_time: Option<i64>);

    fn on_alarm_severity_updated(&self, alarm: &Alarm, previous_severity: Option<Severity>);

    fn on_alarm_archived(&self, alarm: &Alarm, previous_reduction_key: &str);

    fn on_alarm_deleted(&self, alarm: &Alarm);

    fn on_sticky_memo_updated(
        &self,
        alarm: &Alarm,
        previous_body: Option<&str>,
        previous_author: Option<&str>,
        previous_updated: Option<i64>,
    );

    fn on_journal_memo_updated(
        &self,
        alarm: &Alarm,
        previous_body: Option<&str>,
        previous_author: Option<&str>,
        previous_updated: Option<i64>,
    );

    fn on_sticky_memo_deleted(
        &self,
        alarm: &Alarm,
        previous_body: Option<&str>,
        previous_author: Option<&str>,
        previous_updated: Option<i64>,
    );

    fn on_journal_memo_deleted(
        &self,
        alarm: &Alarm,
        previous_body: Option<&str>,
        previous_author: Option<&str>,
        previous_updated: Option<i64>,
    );

    fn on_related_alarms_updated(&self, alarm: &Alarm, previous_related: &[Alarm]);

    /// Automation bookkeeping is not archived.
    fn on_last_automation_time_updated(&self, _alarm: &Alarm, _previous: Option<i64>) {}
}

pub struct AlarmArchiver {
    translator: DocumentTranslator,
    queue: IngestQueue,
    writer: BatchingWriter,
}

impl AlarmArchiver {
    pub fn new(config: &ArchiveConfig, clock: Arc<dyn Clock>, client: Arc<dyn BulkUpsertClient>) -> Self {
        let (queue, receiver) = ingest_queue(config.queue_capacity);
        let settings = BatchSettings {
            batch_size: config.batch_size,
            max_fill_wait: config.max_fill_wait(),
        };

        Self {
            translator: DocumentTranslator::new(clock, NodeCache::new(config.node_cache_max_entries)),
            queue,
            writer: BatchingWriter::new(settings, receiver, client),
        }
    }

    /// Build with the clock the configuration asks for.
    pub fn from_config(config: &ArchiveConfig, client: Arc<dyn BulkUpsertClient>) -> Self {
        let clock: Arc<dyn Clock> = if config.use_pseudo_clock {
            Arc::new(PseudoClock::new())
        } else {
            Arc::new(SystemClock)
        };
        Self::new(config, clock, client)
    }

    pub fn start(&self) -> Result<()> {
        self.writer.start()
    }

    pub async fn stop(&self) {
        self.writer.stop().await
    }

    pub fn translator(&self) -> &DocumentTranslator {
        &self.translator
    }

    pub fn queue(&self) -> &IngestQueue {
        &self.queue
    }

    pub fn stats(&self) -> Arc<WriterStats> {
        self.writer.stats()
    }

    fn submit(&self, operation: &'static str, alarm: &Alarm, doc: Result<AlarmDocument>) {
        match doc {
            Ok(doc) => {
                trace!("{} for alarm {}", operation, alarm.id);
                // Overflow is already counted and logged by the queue
                let _ = self.queue.offer(doc);
            }
            Err(ArchiveError::Translation(reason)) => {
                counter!(TRANSLATION_FAILURES).increment(1);
                error!("Dropping {} for alarm {}: {}", operation, alarm.id, reason);
            }
            Err(e) => {
                counter!(TRANSLATION_FAILURES).increment(1);
                error!("Failed to translate {} for alarm {}: {}", operation, alarm.id, e);
            }
        }
    }
}

fn previous_memo(body: Option<&str>, author: Option<&str>, updated: Option<i64>) -> Memo {
    Memo {
        body: body.map(str::to_string),
        author: author.map(str::to_string),
        updated,
    }
}

impl AlarmEntityListener for AlarmArchiver {
    fn on_alarm_created(&self, alarm: &Alarm) {
        self.submit("created", alarm, self.translator.on_created(alarm));
    }

    fn on_alarm_updated_with_reduced_event(&self, alarm: &Alarm, before: &Alarm) {
        self.submit(
            "reduction",
            alarm,
            self.translator.on_updated_with_reduced_event(alarm, before),
        );
    }

    fn on_alarm_acknowledged(&self, alarm: &Alarm, previous_ack_user: Option<&str>, previous_ack_time: Option<i64>) {
        self.submit(
            "acknowledge",
            alarm,
            self.translator
                .on_acknowledged(alarm, previous_ack_user, previous_ack_time),
        );
    }

    fn on_alarm_unacknowledged(&self, alarm: &Alarm, previous_ack_user: Option<&str>, previous_ack_time: Option<i64>) {
        self.submit(
            "unacknowledge",
            alarm,
            self.translator
                .on_unacknowledged(alarm, previous_ack_user, previous_ack_time),
        );
    }

    fn on_alarm_severity_updated(&self, alarm: &Alarm, previous_severity: Option<Severity>) {
        self.submit(
            "severity update",
            alarm,
            self.translator.on_severity_updated(alarm, previous_severity),
        );
    }

    fn on_alarm_archived(&self, alarm: &Alarm, previous_reduction_key: &str) {
        self.submit(
            "archive",
            alarm,
            self.translator.on_archived(alarm, previous_reduction_key),
        );
    }

    fn on_alarm_deleted(&self, alarm: &Alarm) {
        self.submit("delete", alarm, self.translator.on_deleted(alarm));
    }

    fn on_sticky_memo_updated(
        &self,
        alarm: &Alarm,
        previous_body: Option<&str>,
        previous_author: Option<&str>,
        previous_updated: Option<i64>,
    ) {
        self.submit(
            "sticky memo update",
            alarm,
            self.translator
                .on_sticky_memo_updated(alarm, previous_body, previous_author, previous_updated),
        );
    }

    fn on_journal_memo_updated(
        &self,
        alarm: &Alarm,
        previous_body: Option<&str>,
        previous_author: Option<&str>,
        previous_updated: Option<i64>,
    ) {
        self.submit(
            "journal memo update",
            alarm,
            self.translator
                .on_journal_memo_updated(alarm, previous_body, previous_author, previous_updated),
        );
    }

    fn on_sticky_memo_deleted(
        &self,
        alarm: &Alarm,
        previous_body: Option<&str>,
        previous_author: Option<&str>,
        previous_updated: Option<i64>,
    ) {
        let memo = previous_memo(previous_body, previous_author, previous_updated);
        self.submit(
            "sticky memo delete",
            alarm,
            self.translator.on_sticky_memo_deleted(alarm, Some(&memo)),
        );
    }

    fn on_journal_memo_deleted(
        &self,
        alarm: &Alarm,
        previous_body: Option<&str>,
        previous_author: Option<&str>,
        previous_updated: Option<i64>,
    ) {
        let memo = previous_memo(previous_body, previous_author, previous_updated);
        self.submit(
            "journal memo delete",
            alarm,
            self.translator.on_journal_memo_deleted(alarm, Some(&memo)),
        );
    }

    fn on_related_alarms_updated(&self, alarm: &Alarm, previous_related: &[Alarm]) {
        self.submit(
            "related alarms update",
            alarm,
            self.translator
                .on_related_alarms_updated(alarm, previous_related),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::MockBulkUpsertClient;

    fn archiver(capacity: usize) -> AlarmArchiver {
        let config = ArchiveConfig {
            queue_capacity: capacity,
            ..Default::default()
        };
        let clock = Arc::new(PseudoClock::starting_at(1_000));
        AlarmArchiver::new(&config, clock, Arc::new(MockBulkUpsertClient::new()))
    }

    #[test]
    fn test_callbacks_enqueue_documents() {
        let archiver = archiver(10);
        let mut alarm = Alarm::new(1, "uei.opennms.org/nodes/nodeDown::1", 500);
        archiver.on_alarm_created(&alarm);

        alarm.severity = Severity::Major;
        archiver.on_alarm_severity_updated(&alarm, Some(Severity::Minor));
        archiver.on_sticky_memo_deleted(&alarm, Some("old"), Some("admin"), Some(700));

        assert_eq!(archiver.queue().len(), 3);
    }

    #[test]
    fn test_untranslatable_alarm_is_dropped() {
        let archiver = archiver(10);
        archiver.on_alarm_created(&Alarm::new(1, "", 0));
        assert!(archiver.queue().is_empty());
    }

    #[test]
    fn test_automation_updates_are_ignored() {
        let archiver = archiver(10);
        archiver.on_last_automation_time_updated(&Alarm::new(1, "rk", 0), Some(5));
        assert!(archiver.queue().is_empty());
    }

    #[test]
    fn test_overflow_never_blocks_callbacks() {
        let archiver = archiver(1);
        let alarm = Alarm::new(1, "rk", 0);
        archiver.on_alarm_created(&alarm);
        archiver.on_alarm_deleted(&alarm);
        assert_eq!(archiver.queue().len(), 1);
    }
}
