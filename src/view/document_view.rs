use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::first_change_after;
use crate::document::{AlarmDocument, RelatedAlarmStateChange};
use crate::model::Severity;

/// One archived alarm as it looked at `time`.
#[derive(Debug, Clone, Copy)]
pub struct AlarmDocumentView<'a> {
    alarm: &'a AlarmDocument,
    time: i64,
}

impl<'a> AlarmDocumentView<'a> {
    pub fn new(alarm: &'a AlarmDocument, time: i64) -> Self {
        Self { alarm, time }
    }

    pub fn alarm(&self) -> &'a AlarmDocument {
        self.alarm
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn severity(&self) -> Option<Severity> {
        match first_change_after(&self.alarm.severity_state_changes, self.time) {
            Some(change) => change.severity(),
            None => self.alarm.severity(),
        }
    }

    pub fn ack_user(&self) -> Option<&'a str> {
        let alarm = self.alarm;
        match first_change_after(&alarm.ack_state_changes, self.time) {
            Some(change) => change.ack_user.as_deref(),
            None => alarm.current_ack_user(),
        }
    }

    pub fn ack_time(&self) -> Option<i64> {
        match first_change_after(&self.alarm.ack_state_changes, self.time) {
            Some(change) => change.ack_time,
            None => self.alarm.current_ack_time(),
        }
    }

    /// Reduction keys of the alarms related to this one at `time`.
    pub fn related_reduction_keys(&self) -> HashSet<&'a str> {
        let alarm = self.alarm;
        let current: HashSet<&'a str> = alarm.current_related_reduction_keys().collect();

        let mut by_key: BTreeMap<&'a str, Vec<&'a RelatedAlarmStateChange>> = BTreeMap::new();
        for change in &alarm.related_alarm_state_changes {
            by_key.entry(change.reduction_key.as_str()).or_default().push(change);
        }
        for key in &current {
            by_key.entry(*key).or_default();
        }

        by_key
            .into_iter()
            .filter(|(key, changes)| {
                let next = changes
                    .iter()
                    .filter(|c| c.time > self.time)
                    .min_by_key(|c| c.time);
                match next {
                    // Removed later, so it was present
                    Some(change) => change.removal,
                    None => current.contains(key),
                }
            })
            .map(|(key, _)| key)
            .collect()
    }
}

impl fmt::Display for AlarmDocumentView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AlarmDocumentView[t={}, severity={}, ackTime={}, ackUser={}]",
            self.time,
            self.severity().map(|s| s.label()).unwrap_or("null"),
            self.ack_time().map(|t| t.to_string()).unwrap_or_else(|| "null".to_string()),
            self.ack_user().unwrap_or("null"),
        )
    }
}
