//! Alarm documents as stored in the index.
//!
//! A document has two halves. Snapshot fields are merged into the stored
//! document with last-write-wins upsert semantics; absent fields are left
//! untouched, so a patch only carries what it means to change. The four
//! change logs are append-only: an entry stamped `t` records the value that
//! was in effect immediately *before* `t`.
//!
//! Field names on the wire are kebab-case and must stay in sync with the
//! append script in [`crate::bulk`] and the index template.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::Severity;

pub const SEVERITY_STATE_CHANGES: &str = "severity-state-changes";
pub const ACK_STATE_CHANGES: &str = "ack-state-changes";
pub const MEMO_STATE_CHANGES: &str = "memo-state-changes";
pub const RELATED_ALARM_STATE_CHANGES: &str = "related-alarm-state-changes";

/// The four change-log array fields, in script order.
pub const STATE_CHANGE_FIELDS: [&str; 4] = [
    ACK_STATE_CHANGES,
    MEMO_STATE_CHANGES,
    SEVERITY_STATE_CHANGES,
    RELATED_ALARM_STATE_CHANGES,
];

/// Stored severity ids outside the known range read back as "no severity".
fn severity_from_stored(id: i32) -> Option<Severity> {
    let severity = Severity::try_from_id(id);
    if severity.is_none() {
        debug!("Ignoring unknown stored severity id {}", id);
    }
    severity
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Anything carrying a transition timestamp.
pub trait StateChange {
    fn time(&self) -> i64;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SeverityStateChange {
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_label: Option<String>,
}

impl SeverityStateChange {
    pub fn new(time: i64, previous: Option<Severity>) -> Self {
        Self {
            time,
            severity_id: previous.map(Severity::id),
            severity_label: previous.map(|s| s.label().to_string()),
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        self.severity_id.and_then(severity_from_stored)
    }
}

impl StateChange for SeverityStateChange {
    fn time(&self) -> i64 {
        self.time
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AckStateChange {
    pub time: i64,
    #[serde(default)]
    pub ack_user: Option<String>,
    #[serde(default)]
    pub ack_time: Option<i64>,
}

impl StateChange for AckStateChange {
    fn time(&self) -> i64 {
        self.time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoType {
    Sticky,
    Journal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemoStateChange {
    pub time: i64,
    #[serde(rename = "type")]
    pub memo_type: MemoType,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub update_time: Option<i64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl StateChange for MemoStateChange {
    fn time(&self) -> i64 {
        self.time
    }
}

/// Membership change of one related alarm. Exactly one of `addition` and
/// `removal` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelatedAlarmStateChange {
    pub time: i64,
    pub id: i32,
    pub reduction_key: String,
    #[serde(default)]
    pub addition: bool,
    #[serde(default)]
    pub removal: bool,
}

impl RelatedAlarmStateChange {
    pub fn addition(time: i64, id: i32, reduction_key: impl Into<String>) -> Self {
        Self {
            time,
            id,
            reduction_key: reduction_key.into(),
            addition: true,
            removal: false,
        }
    }

    pub fn removal(time: i64, id: i32, reduction_key: impl Into<String>) -> Self {
        Self {
            time,
            id,
            reduction_key: reduction_key.into(),
            addition: false,
            removal: true,
        }
    }
}

impl StateChange for RelatedAlarmStateChange {
    fn time(&self) -> i64 {
        self.time
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeDocument {
    pub id: i32,
    pub label: String,
    #[serde(default)]
    pub foreign_source: Option<String>,
    #[serde(default)]
    pub foreign_id: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemoDocument {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub update_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventDocument {
    pub id: i32,
    pub uei: String,
    #[serde(default)]
    pub log_message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelatedAlarmDocument {
    pub id: i32,
    pub reduction_key: String,
    #[serde(default)]
    pub first_event_time: Option<i64>,
    #[serde(default)]
    pub last_event_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event: Option<EventDocument>,
    #[serde(default)]
    pub severity_id: Option<i32>,
    #[serde(default)]
    pub severity_label: Option<String>,
    #[serde(default)]
    pub managed_object_type: Option<String>,
    #[serde(default)]
    pub managed_object_instance: Option<String>,
}

impl RelatedAlarmDocument {
    /// Related alarm reference carrying only its identity.
    pub fn reference(id: i32, reduction_key: impl Into<String>) -> Self {
        Self {
            id,
            reduction_key: reduction_key.into(),
            first_event_time: None,
            last_event_time: None,
            last_event: None,
            severity_id: None,
            severity_label: None,
            managed_object_type: None,
            managed_object_instance: None,
        }
    }
}

/// The change-log half of a patch, shaped as the append script's parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateChanges {
    #[serde(rename = "ack-state-changes")]
    pub ack: Vec<AckStateChange>,
    #[serde(rename = "memo-state-changes")]
    pub memo: Vec<MemoStateChange>,
    #[serde(rename = "severity-state-changes")]
    pub severity: Vec<SeverityStateChange>,
    #[serde(rename = "related-alarm-state-changes")]
    pub related_alarm: Vec<RelatedAlarmStateChange>,
}

impl StateChanges {
    pub fn is_empty(&self) -> bool {
        self.ack.is_empty()
            && self.memo.is_empty()
            && self.severity.is_empty()
            && self.related_alarm.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ack.len() + self.memo.len() + self.severity.len() + self.related_alarm.len()
    }
}

/// One alarm's current and historical state.
///
/// Fields typed `Option<Option<T>>` distinguish "leave as is" (`None`) from
/// "clear" (`Some(None)`) when the document is used as a patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AlarmDocument {
    pub id: i32,
    pub reduction_key: String,
    pub first_event_time: i64,
    pub last_event_time: i64,
    pub update_time: i64,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub alarm_type: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_object_instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeDocument>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub sticky_memo: Option<Option<MemoDocument>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub journal_memo: Option<Option<MemoDocument>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub ack_user: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub ack_time: Option<Option<i64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub situation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_alarm_ids: Option<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_alarm_reduction_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_alarms: Option<Vec<RelatedAlarmDocument>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_time: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub severity_state_changes: Vec<SeverityStateChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ack_state_changes: Vec<AckStateChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memo_state_changes: Vec<MemoStateChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_alarm_state_changes: Vec<RelatedAlarmStateChange>,
}

impl AlarmDocument {
    pub fn new(id: i32, reduction_key: impl Into<String>, first_event_time: i64) -> Self {
        Self {
            id,
            reduction_key: reduction_key.into(),
            first_event_time,
            last_event_time: first_event_time,
            ..Default::default()
        }
    }

    pub fn has_state_changes(&self) -> bool {
        !(self.severity_state_changes.is_empty()
            && self.ack_state_changes.is_empty()
            && self.memo_state_changes.is_empty()
            && self.related_alarm_state_changes.is_empty())
    }

    /// Move the change logs out, leaving only snapshot fields behind.
    pub fn take_state_changes(&mut self) -> StateChanges {
        StateChanges {
            ack: std::mem::take(&mut self.ack_state_changes),
            memo: std::mem::take(&mut self.memo_state_changes),
            severity: std::mem::take(&mut self.severity_state_changes),
            related_alarm: std::mem::take(&mut self.related_alarm_state_changes),
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        self.severity_id.and_then(severity_from_stored)
    }

    pub fn set_severity(&mut self, severity: Severity) {
        self.severity_id = Some(severity.id());
        self.severity_label = Some(severity.label().to_string());
    }

    pub fn current_ack_user(&self) -> Option<&str> {
        self.ack_user.as_ref().and_then(|u| u.as_deref())
    }

    pub fn current_ack_time(&self) -> Option<i64> {
        self.ack_time.flatten()
    }

    pub fn is_situation(&self) -> bool {
        self.situation.unwrap_or(false)
    }

    /// Reduction keys of the related alarms in the current snapshot.
    pub fn current_related_reduction_keys(&self) -> impl Iterator<Item = &str> {
        let from_docs = self
            .related_alarms
            .iter()
            .flatten()
            .map(|r| r.reduction_key.as_str());
        let from_keys = self
            .related_alarm_reduction_keys
            .iter()
            .flatten()
            .map(String::as_str);
        from_docs.chain(from_keys)
    }

    /// Append a related alarm to the current snapshot.
    pub fn add_related_alarm(&mut self, related: RelatedAlarmDocument) {
        self.related_alarm_ids
            .get_or_insert_with(Vec::new)
            .push(related.id);
        self.related_alarm_reduction_keys
            .get_or_insert_with(Vec::new)
            .push(related.reduction_key.clone());
        self.related_alarms.get_or_insert_with(Vec::new).push(related);
    }
}
