// src/reader.rs - Fetch archived alarm documents back from the store
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::document::AlarmDocument;
use crate::error::Result;
use crate::view::AlarmTableView;

/// Largest page a single search returns.
pub const SEARCH_SIZE: usize = 10_000;

#[async_trait]
pub trait AlarmsFromStore: Send + Sync {
    /// Every archived alarm document, oldest first.
    async fn all_alarms(&self) -> Result<Vec<AlarmDocument>>;

    async fn table_view(&self) -> Result<AlarmTableView> {
        Ok(AlarmTableView::new(self.all_alarms().await?))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<Hit>,
}

/// `hits.total` is an object on current stores and a bare count on old ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Object { value: u64 },
    Count(u64),
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            TotalHits::Object { value } | TotalHits::Count(value) => *value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: AlarmDocument,
}

/// One search result page.
#[derive(Debug)]
struct SearchPage {
    documents: Vec<AlarmDocument>,
    total: Option<u64>,
}

impl SearchPage {
    /// Number of matching documents the page left out.
    fn missing(&self) -> u64 {
        self.total
            .map(|total| total.saturating_sub(self.documents.len() as u64))
            .unwrap_or(0)
    }
}

#[cfg_attr(not(feature = "elastic"), allow(dead_code))]
fn documents_from_search(body: serde_json::Value) -> Result<SearchPage> {
    let response: SearchResponse = serde_json::from_value(body)?;
    Ok(SearchPage {
        total: response.hits.total.as_ref().map(TotalHits::value),
        documents: response.hits.hits.into_iter().map(|h| h.source).collect(),
    })
}

#[cfg(feature = "elastic")]
mod elastic {
    use super::*;
    use crate::bulk::ElasticClient;
    use crate::error::ArchiveError;
    use crate::index::IndexStrategy;
    use serde_json::json;

    #[async_trait]
    impl AlarmsFromStore for ElasticClient {
        async fn all_alarms(&self) -> Result<Vec<AlarmDocument>> {
            let path = format!(
                "{}/_search?ignore_unavailable=true",
                IndexStrategy::wildcard(self.index_prefix())
            );
            let query = json!({
                "size": SEARCH_SIZE,
                "query": { "match_all": {} },
                "sort": [{ "first-event-time": { "order": "asc" } }],
            });

            let resp = self
                .authorize(self.http().post(self.url(&path)).json(&query))
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ArchiveError::Store {
                    status: status.as_u16(),
                    body: resp.text().await.unwrap_or_default(),
                });
            }

            let page = documents_from_search(resp.json().await?)?;
            let missing = page.missing();
            if missing > 0 {
                warn!(
                    "Search matched {} alarm documents but returned {}; {} omitted",
                    page.documents.len() as u64 + missing,
                    page.documents.len(),
                    missing
                );
            }
            debug!("Fetched {} alarm documents", page.documents.len());
            Ok(page.documents)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(Vec<AlarmDocument>);

    #[async_trait]
    impl AlarmsFromStore for Fixed {
        async fn all_alarms(&self) -> Result<Vec<AlarmDocument>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_documents_from_search_reads_sources() {
        let body = json!({
            "took": 1,
            "hits": {
                "total": { "value": 2 },
                "hits": [
                    { "_index": "a-2018-01", "_id": "1", "_source": {
                        "id": 1, "reduction-key": "r1", "first-event-time": 5,
                        "last-event-time": 5, "update-time": 6 } },
                    { "_index": "a-2018-01", "_id": "2", "_source": {
                        "id": 2, "reduction-key": "r2", "first-event-time": 7,
                        "last-event-time": 8, "update-time": 9, "deleted-time": 9 } }
                ]
            }
        });

        let page = documents_from_search(body).unwrap();
        assert_eq!(page.documents.len(), 2);
        assert_eq!(page.documents[1].deleted_time, Some(9));
        assert_eq!(page.missing(), 0);
    }

    #[test]
    fn test_truncated_search_reports_missing_documents() {
        let body = json!({
            "hits": {
                "total": { "value": 10_250, "relation": "eq" },
                "hits": [
                    { "_source": { "id": 1, "reduction-key": "r1", "first-event-time": 5,
                        "last-event-time": 5, "update-time": 5 } }
                ]
            }
        });
        let page = documents_from_search(body).unwrap();
        assert_eq!(page.documents.len(), 1);
        assert_eq!(page.missing(), 10_249);

        let legacy = json!({ "hits": { "total": 3, "hits": [] } });
        assert_eq!(documents_from_search(legacy).unwrap().missing(), 3);

        let no_total = json!({ "hits": { "hits": [] } });
        assert_eq!(documents_from_search(no_total).unwrap().missing(), 0);
    }

    #[tokio::test]
    async fn test_table_view_from_store() {
        let store = Fixed(vec![AlarmDocument::new(1, "r1", 10)]);
        let table = store.table_view().await.unwrap();
        assert_eq!(table.alarms_at_time(10).len(), 1);
    }
}
