//! Maps alarm lifecycle callbacks onto document patches.
//!
//! Each operation builds a fresh [`AlarmDocument`] carrying the snapshot
//! fields it means to overwrite and the change-log entries for the
//! transition. Entries are stamped with the injected clock's time at
//! translation, never with the originating event's time.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

use crate::clock::Clock;
use crate::document::{
    AckStateChange, AlarmDocument, EventDocument, MemoDocument, MemoStateChange, MemoType,
    RelatedAlarmDocument, RelatedAlarmStateChange, SeverityStateChange,
};
use crate::error::{ArchiveError, Result};
use crate::model::{Alarm, Event, Memo, Severity};
use crate::node_cache::NodeCache;

#[derive(Debug, Clone)]
pub struct DocumentTranslator {
    clock: Arc<dyn Clock>,
    nodes: NodeCache,
}

impl DocumentTranslator {
    pub fn new(clock: Arc<dyn Clock>, nodes: NodeCache) -> Self {
        Self { clock, nodes }
    }

    pub fn node_cache(&self) -> &NodeCache {
        &self.nodes
    }

    // ------------------------------------------------------------------
    // Lifecycle operations
    // ------------------------------------------------------------------

    /// Full snapshot, empty logs.
    pub fn on_created(&self, alarm: &Alarm) -> Result<AlarmDocument> {
        self.to_document(alarm)
    }

    /// Full snapshot plus an entry for every field that changed during reduction.
    pub fn on_updated_with_reduced_event(
        &self,
        alarm: &Alarm,
        before: &Alarm,
    ) -> Result<AlarmDocument> {
        let mut doc = self.to_document(alarm)?;
        let now = doc.update_time;

        if before.severity != alarm.severity {
            doc.severity_state_changes
                .push(SeverityStateChange::new(now, Some(before.severity)));
        }
        if before.ack_user != alarm.ack_user || before.ack_time != alarm.ack_time {
            doc.ack_state_changes.push(AckStateChange {
                time: now,
                ack_user: before.ack_user.clone(),
                ack_time: before.ack_time,
            });
        }
        append_related_alarm_changes(&mut doc, now, &before.related_alarms, &alarm.related_alarms);
        Ok(doc)
    }

    pub fn on_acknowledged(
        &self,
        alarm: &Alarm,
        previous_ack_user: Option<&str>,
        previous_ack_time: Option<i64>,
    ) -> Result<AlarmDocument> {
        self.ack_patch(alarm, previous_ack_user, previous_ack_time)
    }

    pub fn on_unacknowledged(
        &self,
        alarm: &Alarm,
        previous_ack_user: Option<&str>,
        previous_ack_time: Option<i64>,
    ) -> Result<AlarmDocument> {
        self.ack_patch(alarm, previous_ack_user, previous_ack_time)
    }

    pub fn on_severity_updated(
        &self,
        alarm: &Alarm,
        previous_severity: Option<Severity>,
    ) -> Result<AlarmDocument> {
        let mut doc = self.to_minimal_document(alarm)?;
        doc.set_severity(alarm.severity);
        doc.severity_state_changes
            .push(SeverityStateChange::new(doc.update_time, previous_severity));
        Ok(doc)
    }

    pub fn on_archived(&self, alarm: &Alarm, previous_reduction_key: &str) -> Result<AlarmDocument> {
        let mut doc = self.to_minimal_document(alarm)?;
        trace!(
            "Alarm {} archived (reduction key was {})",
            alarm.id,
            previous_reduction_key
        );
        doc.archived = Some(alarm.archived);
        doc.archived_time = Some(doc.update_time);
        Ok(doc)
    }

    /// Full snapshot with `deleted-time` set, ending the alarm's existence.
    pub fn on_deleted(&self, alarm: &Alarm) -> Result<AlarmDocument> {
        let mut doc = self.to_document(alarm)?;
        doc.deleted_time = Some(doc.update_time);
        Ok(doc)
    }

    pub fn on_sticky_memo_updated(
        &self,
        alarm: &Alarm,
        previous_body: Option<&str>,
        previous_author: Option<&str>,
        previous_updated: Option<i64>,
    ) -> Result<AlarmDocument> {
        let mut doc = self.to_minimal_document(alarm)?;
        doc.sticky_memo = Some(alarm.sticky_memo.as_ref().map(to_memo));
        append_memo_change(&mut doc, MemoType::Sticky, previous_body, previous_author, previous_updated);
        Ok(doc)
    }

    pub fn on_sticky_memo_deleted(&self, alarm: &Alarm, memo: Option<&Memo>) -> Result<AlarmDocument> {
        let mut doc = self.to_minimal_document(alarm)?;
        doc.sticky_memo = Some(None);
        append_memo_deleted(&mut doc, MemoType::Sticky, memo);
        Ok(doc)
    }

    pub fn on_journal_memo_updated(
        &self,
        alarm: &Alarm,
        previous_body: Option<&str>,
        previous_author: Option<&str>,
        previous_updated: Option<i64>,
    ) -> Result<AlarmDocument> {
        let mut doc = self.to_minimal_document(alarm)?;
        doc.journal_memo = Some(alarm.journal_memo.as_ref().map(to_memo));
        append_memo_change(&mut doc, MemoType::Journal, previous_body, previous_author, previous_updated);
        Ok(doc)
    }

    pub fn on_journal_memo_deleted(&self, alarm: &Alarm, memo: Option<&Memo>) -> Result<AlarmDocument> {
        let mut doc = self.to_minimal_document(alarm)?;
        doc.journal_memo = Some(None);
        append_memo_deleted(&mut doc, MemoType::Journal, memo);
        Ok(doc)
    }

    /// Full snapshot plus one addition or removal entry per changed related alarm.
    pub fn on_related_alarms_updated(
        &self,
        alarm: &Alarm,
        previous_related: &[Alarm],
    ) -> Result<AlarmDocument> {
        let mut doc = self.to_document(alarm)?;
        let now = doc.update_time;
        append_related_alarm_changes(&mut doc, now, previous_related, &alarm.related_alarms);
        Ok(doc)
    }

    // ------------------------------------------------------------------
    // Document builders
    // ------------------------------------------------------------------

    fn ack_patch(
        &self,
        alarm: &Alarm,
        previous_ack_user: Option<&str>,
        previous_ack_time: Option<i64>,
    ) -> Result<AlarmDocument> {
        let mut doc = self.to_minimal_document(alarm)?;
        doc.ack_user = Some(alarm.ack_user.clone());
        doc.ack_time = Some(alarm.ack_time);
        doc.ack_state_changes.push(AckStateChange {
            time: doc.update_time,
            ack_user: previous_ack_user.map(str::to_string),
            ack_time: previous_ack_time,
        });
        Ok(doc)
    }

    fn to_minimal_document(&self, alarm: &Alarm) -> Result<AlarmDocument> {
        if alarm.reduction_key.is_empty() {
            return Err(ArchiveError::Translation(format!(
                "alarm {} has an empty reduction key",
                alarm.id
            )));
        }
        if alarm.last_event_time < alarm.first_event_time {
            return Err(ArchiveError::Translation(format!(
                "alarm {} last event time {} precedes first event time {}",
                alarm.id, alarm.last_event_time, alarm.first_event_time
            )));
        }

        let mut doc = AlarmDocument::new(alarm.id, alarm.reduction_key.clone(), alarm.first_event_time);
        doc.last_event_time = alarm.last_event_time;
        doc.update_time = self.clock.now_millis();
        Ok(doc)
    }

    fn to_document(&self, alarm: &Alarm) -> Result<AlarmDocument> {
        let mut doc = self.to_minimal_document(alarm)?;
        doc.alarm_type = Some(alarm.alarm_type);
        doc.log_message = alarm.log_message.clone();
        doc.description = alarm.description.clone();
        doc.operator_instructions = alarm.operator_instructions.clone();
        doc.set_severity(alarm.severity);
        doc.archived = Some(alarm.archived);
        doc.managed_object_type = alarm.managed_object_type.clone();
        doc.managed_object_instance = alarm.managed_object_instance.clone();
        doc.node = alarm.node.as_ref().map(|n| self.nodes.get_or_render(n));

        doc.sticky_memo = Some(alarm.sticky_memo.as_ref().map(to_memo));
        doc.journal_memo = Some(alarm.journal_memo.as_ref().map(to_memo));

        doc.ack_user = Some(alarm.ack_user.clone());
        doc.ack_time = Some(alarm.ack_time);

        doc.situation = Some(alarm.situation);
        doc.related_alarm_ids = Some(Vec::with_capacity(alarm.related_alarms.len()));
        doc.related_alarm_reduction_keys = Some(Vec::with_capacity(alarm.related_alarms.len()));
        doc.related_alarms = Some(Vec::with_capacity(alarm.related_alarms.len()));
        for related in &alarm.related_alarms {
            doc.add_related_alarm(to_related_alarm(related));
        }
        Ok(doc)
    }
}

fn to_memo(memo: &Memo) -> MemoDocument {
    MemoDocument {
        author: memo.author.clone(),
        body: memo.body.clone(),
        update_time: memo.updated,
    }
}

fn to_event(event: &Event) -> EventDocument {
    EventDocument {
        id: event.id,
        uei: event.uei.clone(),
        log_message: event.log_message.clone(),
        description: event.description.clone(),
    }
}

fn to_related_alarm(alarm: &Alarm) -> RelatedAlarmDocument {
    RelatedAlarmDocument {
        id: alarm.id,
        reduction_key: alarm.reduction_key.clone(),
        first_event_time: Some(alarm.first_event_time),
        last_event_time: Some(alarm.last_event_time),
        last_event: alarm.last_event.as_ref().map(to_event),
        severity_id: Some(alarm.severity.id()),
        severity_label: Some(alarm.severity.label().to_string()),
        managed_object_type: alarm.managed_object_type.clone(),
        managed_object_instance: alarm.managed_object_instance.clone(),
    }
}

fn append_memo_change(
    doc: &mut AlarmDocument,
    memo_type: MemoType,
    previous_body: Option<&str>,
    previous_author: Option<&str>,
    previous_updated: Option<i64>,
) {
    doc.memo_state_changes.push(MemoStateChange {
        time: doc.update_time,
        memo_type,
        body: previous_body.map(str::to_string),
        author: previous_author.map(str::to_string),
        update_time: previous_updated,
        deleted: false,
    });
}

fn append_memo_deleted(doc: &mut AlarmDocument, memo_type: MemoType, memo: Option<&Memo>) {
    doc.memo_state_changes.push(MemoStateChange {
        time: doc.update_time,
        memo_type,
        body: memo.and_then(|m| m.body.clone()),
        author: memo.and_then(|m| m.author.clone()),
        update_time: memo.and_then(|m| m.updated),
        deleted: true,
    });
}

/// Diff two related-alarm sets by alarm id. Additions come first, each group
/// in ascending id order.
fn append_related_alarm_changes(
    doc: &mut AlarmDocument,
    now: i64,
    previous: &[Alarm],
    current: &[Alarm],
) {
    let previous: BTreeMap<i32, &Alarm> = previous.iter().map(|a| (a.id, a)).collect();
    let current: BTreeMap<i32, &Alarm> = current.iter().map(|a| (a.id, a)).collect();

    for (id, added) in current.iter().filter(|(id, _)| !previous.contains_key(id)) {
        doc.related_alarm_state_changes
            .push(RelatedAlarmStateChange::addition(now, *id, added.reduction_key.clone()));
    }
    for (id, removed) in previous.iter().filter(|(id, _)| !current.contains_key(id)) {
        doc.related_alarm_state_changes
            .push(RelatedAlarmStateChange::removal(now, *id, removed.reduction_key.clone()));
    }
}
