//! The alarm domain as seen by the archiver.
//!
//! These types are owned by the alarm engine; the archiver only reads them
//! from lifecycle callbacks and never mutates them.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Alarm severity levels, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Indeterminate = 1,
    Cleared = 2,
    Normal = 3,
    Warning = 4,
    Minor = 5,
    Major = 6,
    Critical = 7,
}

impl Severity {
    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Indeterminate => "INDETERMINATE",
            Severity::Cleared => "CLEARED",
            Severity::Normal => "NORMAL",
            Severity::Warning => "WARNING",
            Severity::Minor => "MINOR",
            Severity::Major => "MAJOR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Look up a severity by its numeric id. Unknown ids map to `Indeterminate`.
    pub fn from_id(id: i32) -> Self {
        Self::try_from_id(id).unwrap_or_else(|| {
            debug!("Unknown severity id {}, treating as indeterminate", id);
            Severity::Indeterminate
        })
    }

    pub fn try_from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Severity::Indeterminate),
            2 => Some(Severity::Cleared),
            3 => Some(Severity::Normal),
            4 => Some(Severity::Warning),
            5 => Some(Severity::Minor),
            6 => Some(Severity::Major),
            7 => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Alarm type codes
pub mod alarm_type {
    pub const PROBLEM: i32 = 1;
    pub const RESOLUTION: i32 = 2;
    pub const PROBLEM_WITHOUT_RESOLUTION: i32 = 3;
}

/// Node the alarm was raised against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i32,
    pub label: String,
    pub foreign_source: Option<String>,
    pub foreign_id: Option<String>,
    pub categories: Vec<String>,
}

/// Sticky or journal memo attached to an alarm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    pub body: Option<String>,
    pub author: Option<String>,
    /// Last update, epoch millis
    pub updated: Option<i64>,
}

/// The last event that touched an alarm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i32,
    pub uei: String,
    pub log_message: Option<String>,
    pub description: Option<String>,
}

/// A live alarm. Times are epoch millis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: i32,
    pub reduction_key: String,
    pub alarm_type: i32,
    pub first_event_time: i64,
    pub last_event_time: i64,
    pub last_event: Option<Event>,
    pub log_message: Option<String>,
    pub description: Option<String>,
    pub operator_instructions: Option<String>,
    pub severity: Severity,
    pub archived: bool,
    pub managed_object_type: Option<String>,
    pub managed_object_instance: Option<String>,
    pub node: Option<Node>,
    pub sticky_memo: Option<Memo>,
    pub journal_memo: Option<Memo>,
    pub ack_user: Option<String>,
    pub ack_time: Option<i64>,
    pub situation: bool,
    pub related_alarms: Vec<Alarm>,
}

impl Alarm {
    /// A bare alarm with the mandatory fields set and everything else empty.
    pub fn new(id: i32, reduction_key: impl Into<String>, first_event_time: i64) -> Self {
        Self {
            id,
            reduction_key: reduction_key.into(),
            alarm_type: alarm_type::PROBLEM,
            first_event_time,
            last_event_time: first_event_time,
            last_event: None,
            log_message: None,
            description: None,
            operator_instructions: None,
            severity: Severity::Indeterminate,
            archived: false,
            managed_object_type: None,
            managed_object_instance: None,
            node: None,
            sticky_memo: None,
            journal_memo: None,
            ack_user: None,
            ack_time: None,
            situation: false,
            related_alarms: Vec::new(),
        }
    }

    pub fn node_id(&self) -> Option<i32> {
        self.node.as_ref().map(|n| n.id)
    }
}
