//! Bulk request bodies and bulk response interpretation.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};

use crate::document::{AlarmDocument, StateChanges};
use crate::index::IndexStrategy;

/// Painless script appending the patch's entries to the four change-log
/// arrays, creating any array the stored document lacks.
pub const APPEND_SCRIPT: &str = "for (String f : ['ack-state-changes', 'memo-state-changes', \
'severity-state-changes', 'related-alarm-state-changes']) { \
if (ctx._source[f] == null) { ctx._source[f] = new ArrayList(); } \
if (params[f] != null) { ctx._source[f].addAll(params[f]); } }";

#[derive(Debug, Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Serialize)]
struct UpsertBody<'a> {
    doc: &'a AlarmDocument,
    doc_as_upsert: bool,
}

/// An NDJSON bulk body plus, for each action line pair, the batch position
/// of the document that produced it.
#[derive(Debug, Clone)]
pub struct PreparedBulk {
    pub body: String,
    pub action_owner: Vec<usize>,
    /// Target index per batch position
    pub indices: BTreeMap<usize, String>,
}

impl PreparedBulk {
    pub fn action_count(&self) -> usize {
        self.action_owner.len()
    }
}

/// Build the bulk body for `(position, document)` pairs.
pub fn prepare<'a>(
    documents: impl IntoIterator<Item = (usize, &'a AlarmDocument)>,
    index_prefix: &str,
    strategy: IndexStrategy,
) -> Result<PreparedBulk, serde_json::Error> {
    let mut body = String::new();
    let mut action_owner = Vec::new();
    let mut indices = BTreeMap::new();

    for (position, document) in documents {
        let index = strategy.index_for(index_prefix, document.first_event_time);
        let mut snapshot = document.clone();
        let changes: StateChanges = snapshot.take_state_changes();

        let meta = json!({ "update": ActionMeta { index: &index, id: document.id.to_string() } });
        body.push_str(&serde_json::to_string(&meta)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&UpsertBody {
            doc: &snapshot,
            doc_as_upsert: true,
        })?);
        body.push('\n');
        action_owner.push(position);

        if !changes.is_empty() {
            body.push_str(&serde_json::to_string(&meta)?);
            body.push('\n');
            let script = json!({
                "script": {
                    "lang": "painless",
                    "source": APPEND_SCRIPT,
                    "params": changes,
                }
            });
            body.push_str(&serde_json::to_string(&script)?);
            body.push('\n');
            action_owner.push(position);
        }

        indices.insert(position, index);
    }

    Ok(PreparedBulk {
        body,
        action_owner,
        indices,
    })
}

#[derive(Debug, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
pub struct BulkItem {
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: Option<JsonValue>,
}

impl BulkItem {
    fn failed(&self) -> bool {
        self.error.is_some() || self.status >= 300
    }

    fn reason(&self) -> String {
        match &self.error {
            Some(JsonValue::Object(err)) => err
                .get("reason")
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| JsonValue::Object(err.clone()).to_string()),
            Some(other) => other.to_string(),
            None => format!("status {}", self.status),
        }
    }
}

/// Failed batch positions with the first status and reason seen for each.
/// Actions missing from the response count as failed.
pub fn failed_positions(
    response: &BulkResponse,
    action_owner: &[usize],
) -> BTreeMap<usize, (Option<u16>, String)> {
    let mut failed = BTreeMap::new();

    for (action, position) in action_owner.iter().enumerate() {
        match response.items.get(action).and_then(|item| item.values().next()) {
            Some(item) if item.failed() => {
                failed
                    .entry(*position)
                    .or_insert_with(|| (Some(item.status), item.reason()));
            }
            Some(_) => {}
            None => {
                failed
                    .entry(*position)
                    .or_insert_with(|| (None, "no result for action".to_string()));
            }
        }
    }
    failed
}

/// 429 and 5xx are worth another attempt; other item errors are permanent.
pub fn is_retryable(status: Option<u16>) -> bool {
    match status {
        None => true,
        Some(429) => true,
        Some(s) => s >= 500,
    }
}
