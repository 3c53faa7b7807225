//! Time-partitioned index naming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How documents are bucketed into indices by their reference timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStrategy {
    Yearly,
    #[default]
    Monthly,
    Daily,
    Hourly,
}

impl IndexStrategy {
    fn pattern(self) -> &'static str {
        match self {
            IndexStrategy::Yearly => "%Y",
            IndexStrategy::Monthly => "%Y-%m",
            IndexStrategy::Daily => "%Y-%m-%d",
            IndexStrategy::Hourly => "%Y-%m-%d-%H",
        }
    }

    /// Index name for a timestamp in epoch millis, e.g. `opennms-alarms-2018-01`.
    pub fn index_for(self, prefix: &str, epoch_millis: i64) -> String {
        let time = DateTime::<Utc>::from_timestamp_millis(epoch_millis).unwrap_or_default();
        format!("{}-{}", prefix, time.format(self.pattern()))
    }

    /// Pattern matching every index this strategy can produce for `prefix`.
    pub fn wildcard(prefix: &str) -> String {
        format!("{}-*", prefix)
    }
}
