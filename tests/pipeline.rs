//! End-to-end: lifecycle callbacks through the writer into an in-memory
//! store with upsert and append semantics, then back out through the views.

use alarm_archive::document::STATE_CHANGE_FIELDS;
use alarm_archive::model::{Alarm, Severity};
use alarm_archive::{
    AlarmArchiver, AlarmDocument, AlarmDocumentView, AlarmEntityListener, AlarmTableView,
    ArchiveConfig, BulkFailure, BulkUpsertClient, PseudoClock,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Applies each patch the way the bulk actions do: snapshot fields
/// overwrite, change logs append.
#[derive(Default)]
struct MemoryStore {
    docs: Mutex<BTreeMap<i32, Value>>,
    batches: Mutex<Vec<usize>>,
}

impl MemoryStore {
    fn apply(&self, patch: &AlarmDocument) {
        let mut patch = serde_json::to_value(patch).unwrap();
        let mut docs = self.docs.lock();
        let stored = docs
            .entry(patch["id"].as_i64().unwrap() as i32)
            .or_insert_with(|| Value::Object(Default::default()));

        let patch = patch.as_object_mut().unwrap();
        for field in STATE_CHANGE_FIELDS {
            if let Some(Value::Array(entries)) = patch.remove(field) {
                let log = stored
                    .as_object_mut()
                    .unwrap()
                    .entry(field)
                    .or_insert_with(|| Value::Array(Vec::new()));
                log.as_array_mut().unwrap().extend(entries);
            }
        }
        for (key, value) in patch.iter() {
            stored[key.as_str()] = value.clone();
        }
    }

    fn documents(&self) -> Vec<AlarmDocument> {
        self.docs
            .lock()
            .values()
            .map(|v| serde_json::from_value(v.clone()).unwrap())
            .collect()
    }
}

#[async_trait]
impl BulkUpsertClient for MemoryStore {
    async fn bulk_upsert(&self, documents: Vec<AlarmDocument>) -> Result<(), BulkFailure> {
        self.batches.lock().push(documents.len());
        for doc in &documents {
            self.apply(doc);
        }
        Ok(())
    }
}

fn config() -> ArchiveConfig {
    ArchiveConfig {
        batch_size: 50,
        max_fill_wait_ms: 20,
        queue_capacity: 100,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_lifecycle_is_reconstructable() {
    let clock = Arc::new(PseudoClock::starting_at(1_000));
    let store = Arc::new(MemoryStore::default());
    let archiver = AlarmArchiver::new(&config(), clock.clone(), store.clone());
    archiver.start().unwrap();

    let mut alarm = Alarm::new(1, "uei.opennms.org/nodes/nodeDown::1", 1_000);
    alarm.severity = Severity::Minor;
    archiver.on_alarm_created(&alarm);

    clock.set(2_000);
    alarm.severity = Severity::Major;
    archiver.on_alarm_severity_updated(&alarm, Some(Severity::Minor));

    clock.set(3_000);
    alarm.ack_user = Some("admin".to_string());
    alarm.ack_time = Some(3_000);
    archiver.on_alarm_acknowledged(&alarm, None, None);

    clock.set(4_000);
    let previous_related = alarm.related_alarms.clone();
    alarm.related_alarms.push(Alarm::new(2, "r2", 3_500));
    archiver.on_related_alarms_updated(&alarm, &previous_related);

    clock.set(5_000);
    alarm.ack_user = None;
    alarm.ack_time = None;
    archiver.on_alarm_unacknowledged(&alarm, Some("admin"), Some(3_000));

    tokio::time::sleep(Duration::from_millis(200)).await;
    archiver.stop().await;

    assert_eq!(archiver.stats().documents_flushed(), 5);
    assert_eq!(store.batches.lock().iter().sum::<usize>(), 5);

    let docs = store.documents();
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.severity(), Some(Severity::Major));
    assert_eq!(doc.current_ack_user(), None);
    assert_eq!(doc.ack_state_changes.len(), 2);

    let at = |t| AlarmDocumentView::new(doc, t);
    assert_eq!(at(1_500).severity(), Some(Severity::Minor));
    assert_eq!(at(2_500).severity(), Some(Severity::Major));
    assert_eq!(at(2_500).ack_user(), None);
    assert_eq!(at(3_500).ack_user(), Some("admin"));
    assert_eq!(at(3_500).ack_time(), Some(3_000));
    assert_eq!(at(5_500).ack_user(), None);
    assert!(at(3_500).related_reduction_keys().is_empty());
    assert!(at(4_500).related_reduction_keys().contains("r2"));

    let table = AlarmTableView::new(docs.clone());
    assert_eq!(table.problem_alarm_at_time(4_000).unwrap().alarm().id, 1);
    assert!(table.alarms_at_time(999).is_empty());
}

#[tokio::test]
async fn test_deleted_alarm_leaves_table() {
    let clock = Arc::new(PseudoClock::starting_at(100));
    let store = Arc::new(MemoryStore::default());
    let archiver = AlarmArchiver::new(&config(), clock.clone(), store.clone());
    archiver.start().unwrap();

    let alarm = Alarm::new(7, "rk-7", 100);
    archiver.on_alarm_created(&alarm);
    clock.set(900);
    archiver.on_alarm_deleted(&alarm);

    tokio::time::sleep(Duration::from_millis(200)).await;
    archiver.stop().await;

    let table = AlarmTableView::new(store.documents());
    assert_eq!(table.alarms_at_time(500).len(), 1);
    assert!(table.alarms_at_time(900).is_empty());
}

#[tokio::test]
async fn test_overflow_is_dropped_not_flushed() {
    let clock = Arc::new(PseudoClock::new());
    let store = Arc::new(MemoryStore::default());
    let config = ArchiveConfig {
        queue_capacity: 2,
        ..config()
    };
    // Writer not started yet, so the queue fills up
    let archiver = AlarmArchiver::new(&config, clock, store.clone());
    for id in 1..=3 {
        archiver.on_alarm_created(&Alarm::new(id, format!("rk-{id}"), 0));
    }
    archiver.start().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    archiver.stop().await;

    let ids: Vec<i32> = store.documents().iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_restart_after_stop_is_rejected() {
    let archiver = AlarmArchiver::new(
        &config(),
        Arc::new(PseudoClock::new()),
        Arc::new(MemoryStore::default()),
    );
    archiver.start().unwrap();
    archiver.stop().await;
    archiver.stop().await;
    assert!(matches!(
        archiver.start(),
        Err(alarm_archive::ArchiveError::AlreadyStopped)
    ));
}
