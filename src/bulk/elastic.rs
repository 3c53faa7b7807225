// src/bulk/elastic.rs - Elasticsearch bulk client
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::request::{self, BulkResponse};
use super::{BulkFailure, BulkUpsertClient, FailedItem};
use crate::config::ArchiveConfig;
use crate::document::AlarmDocument;
use crate::error::{ArchiveError, Result};
use crate::index::IndexStrategy;
use crate::telemetry::{BULK_FAILURES, BULK_INSERT_SECONDS, BULK_RETRIES};

/// HTTP client for an Elasticsearch-compatible document store.
pub struct ElasticClient {
    http: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    index_prefix: String,
    strategy: IndexStrategy,
    max_retries: u32,
    retry_delay: Duration,
    template_ready: AtomicBool,
}

impl ElasticClient {
    pub fn new(config: &ArchiveConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            http,
            base_url: config.elastic_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            index_prefix: config.index_prefix.clone(),
            strategy: config.index_strategy,
            max_retries: config.bulk_retry_count,
            retry_delay: config.retry_delay(),
            template_ready: AtomicBool::new(false),
        })
    }

    pub fn index_prefix(&self) -> &str {
        &self.index_prefix
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }

    /// Install the index template once. A failure is logged and tried again
    /// before the next bulk request.
    pub async fn ensure_template(&self) {
        if self.template_ready.load(Ordering::Acquire) {
            return;
        }

        let url = self.url(&format!("_index_template/{}", self.index_prefix));
        let body = index_template(&self.index_prefix);
        let response = self.authorize(self.http.put(&url).json(&body)).send().await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                self.template_ready.store(true, Ordering::Release);
                info!("Installed index template {}", self.index_prefix);
            }
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                warn!("Index template install returned {}: {}", status, text);
            }
            Err(e) => warn!("Index template install failed: {}", e),
        }
    }

    pub fn template_ready(&self) -> bool {
        self.template_ready.load(Ordering::Acquire)
    }

    async fn send_bulk(&self, body: String) -> Result<BulkResponse> {
        let request = self
            .http
            .post(self.url("_bulk"))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        let resp = self.authorize(request).send().await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(ArchiveError::Store {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<BulkResponse>().await?)
    }

    fn failure(
        &self,
        documents: &[AlarmDocument],
        failed: &BTreeMap<usize, (Option<u16>, String)>,
        attempts: u32,
        message: String,
    ) -> BulkFailure {
        let failed = failed
            .iter()
            .map(|(position, (status, reason))| {
                let doc = &documents[*position];
                FailedItem {
                    position: *position,
                    id: doc.id,
                    reduction_key: doc.reduction_key.clone(),
                    index: self.strategy.index_for(&self.index_prefix, doc.first_event_time),
                    status: *status,
                    reason: reason.clone(),
                }
            })
            .collect();

        BulkFailure {
            message,
            attempts,
            total: documents.len(),
            failed,
        }
    }
}

#[async_trait]
impl BulkUpsertClient for ElasticClient {
    async fn bulk_upsert(&self, documents: Vec<AlarmDocument>) -> std::result::Result<(), BulkFailure> {
        if documents.is_empty() {
            return Ok(());
        }

        self.ensure_template().await;

        let started = Instant::now();
        let mut pending: Vec<usize> = (0..documents.len()).collect();
        let mut permanent: BTreeMap<usize, (Option<u16>, String)> = BTreeMap::new();
        let mut attempts = 0;

        loop {
            attempts += 1;

            let failed: BTreeMap<usize, (Option<u16>, String)> = match request::prepare(
                pending.iter().map(|p| (*p, &documents[*p])),
                &self.index_prefix,
                self.strategy,
            ) {
                Ok(prepared) => match self.send_bulk(prepared.body).await {
                    Ok(response) => request::failed_positions(&response, &prepared.action_owner),
                    Err(e) => pending.iter().map(|p| (*p, (None, e.to_string()))).collect(),
                },
                Err(e) => {
                    // Encoding never gets better on retry
                    permanent.extend(pending.iter().map(|p| (*p, (None, e.to_string()))));
                    counter!(BULK_FAILURES).increment(1);
                    return Err(self.failure(&documents, &permanent, attempts, format!("Bulk encoding failed: {}", e)));
                }
            };

            let (retryable, fatal): (BTreeMap<_, _>, BTreeMap<_, _>) = failed
                .into_iter()
                .partition(|(_, (status, _))| request::is_retryable(*status));
            permanent.extend(fatal);

            if retryable.is_empty() && permanent.is_empty() {
                histogram!(BULK_INSERT_SECONDS).record(started.elapsed().as_secs_f64());
                debug!("Bulk upserted {} documents in {} attempt(s)", documents.len(), attempts);
                return Ok(());
            }

            if retryable.is_empty() || attempts > self.max_retries {
                permanent.extend(retryable);
                counter!(BULK_FAILURES).increment(1);
                error!(
                    "Bulk upsert failed for {} of {} documents after {} attempt(s)",
                    permanent.len(),
                    documents.len(),
                    attempts
                );
                return Err(self.failure(&documents, &permanent, attempts, "Bulk upsert failed".to_string()));
            }

            counter!(BULK_RETRIES).increment(1);
            warn!(
                "Bulk upsert failed for {} documents (retry {}/{})",
                retryable.len(),
                attempts,
                self.max_retries
            );
            pending = retryable.keys().copied().collect();
            tokio::time::sleep(self.retry_delay * attempts).await;
        }
    }
}

/// Index template matching `<prefix>-*`. Change logs are nested so each
/// entry's fields stay together; all times are epoch milliseconds.
pub fn index_template(prefix: &str) -> JsonValue {
    let date = json!({ "type": "date", "format": "epoch_millis" });
    let keyword = json!({ "type": "keyword" });

    json!({
        "index_patterns": [format!("{}-*", prefix)],
        "template": {
            "mappings": {
                "properties": {
                    "id": { "type": "integer" },
                    "reduction-key": keyword,
                    "type": { "type": "integer" },
                    "first-event-time": date,
                    "last-event-time": date,
                    "update-time": date,
                    "archived-time": date,
                    "deleted-time": date,
                    "ack-time": date,
                    "ack-user": keyword,
                    "severity-id": { "type": "integer" },
                    "severity-label": keyword,
                    "situation": { "type": "boolean" },
                    "related-alarm-ids": { "type": "integer" },
                    "related-alarm-reduction-keys": keyword,
                    "ack-state-changes": {
                        "type": "nested",
                        "properties": {
                            "time": date,
                            "ack-user": keyword,
                            "ack-time": date,
                        }
                    },
                    "memo-state-changes": {
                        "type": "nested",
                        "properties": {
                            "time": date,
                            "type": keyword,
                            "update-time": date,
                        }
                    },
                    "severity-state-changes": {
                        "type": "nested",
                        "properties": {
                            "time": date,
                            "severity-id": { "type": "integer" },
                            "severity-label": keyword,
                        }
                    },
                    "related-alarm-state-changes": {
                        "type": "nested",
                        "properties": {
                            "time": date,
                            "id": { "type": "integer" },
                            "reduction-key": keyword,
                        }
                    },
                }
            }
        }
    })
}
