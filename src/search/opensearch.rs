//! OpenSearch-backed search index.
//!
//! Talks to the REST API directly over HTTP. Documents live in a single
//! index with a `text` field for BM25 and a `knn_vector` field for
//! similarity search.

use super::{IndexedSegment, SearchHit, SearchIndex};
use crate::error::{MinneError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, instrument};
use url::Url;
use uuid::Uuid;

/// Vector hits below this similarity are not worth fusing.
const KNN_MIN_SCORE: f64 = 0.75;

/// OpenSearch search index backend.
pub struct OpenSearchIndex {
    client: reqwest::Client,
    base_url: Url,
    index: String,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: IndexedSegment,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DeleteByQueryResponse {
    #[serde(default)]
    deleted: usize,
}

impl OpenSearchIndex {
    /// Create an index client for the given endpoint.
    ///
    /// Does not touch the network; call [`ensure_index`](Self::ensure_index)
    /// before indexing.
    pub fn new(endpoint: &str, index: &str, dimensions: usize) -> Result<Self> {
        let base_url = Url::parse(endpoint)
            .map_err(|e| MinneError::Config(format!("Invalid OpenSearch endpoint: {}", e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            index: index.to_string(),
            dimensions,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| MinneError::Config(format!("Invalid OpenSearch path: {}", e)))
    }

    /// Create the segments index if it does not exist.
    ///
    /// An "already exists" rejection is treated as success so this is safe
    /// to call before every indexing run.
    #[instrument(skip(self))]
    pub async fn ensure_index(&self) -> Result<()> {
        let body = json!({
            "settings": {
                "index": { "knn": true }
            },
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "video_id": { "type": "keyword" },
                    "video_title": { "type": "text" },
                    "transcript_id": { "type": "keyword" },
                    "text": { "type": "text" },
                    "embedding": {
                        "type": "knn_vector",
                        "dimension": self.dimensions
                    },
                    "start_time": { "type": "float" },
                    "end_time": { "type": "float" },
                    "speaker": { "type": "keyword" },
                    "recording_date": { "type": "date" },
                    "created_at": { "type": "date" }
                }
            }
        });

        let response = self
            .client
            .put(self.url(&self.index)?)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            info!("Created OpenSearch index {}", self.index);
            return Ok(());
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::BAD_REQUEST
            && text.contains("resource_already_exists_exception")
        {
            debug!("OpenSearch index {} already exists", self.index);
            return Ok(());
        }

        Err(MinneError::SearchIndex(format!(
            "Failed to create index {}: {} {}",
            self.index, status, text
        )))
    }

    async fn search(&self, body: serde_json::Value) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(self.url(&format!("{}/_search", self.index))?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(MinneError::SearchIndex(format!(
                "Search failed: {} {}",
                status, text
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| SearchHit {
                score: hit.score.unwrap_or(0.0),
                segment: hit.source,
            })
            .collect())
    }
}

#[async_trait]
impl SearchIndex for OpenSearchIndex {
    #[instrument(skip(self, segments), fields(count = segments.len()))]
    async fn bulk_upsert(&self, segments: &[IndexedSegment]) -> Result<usize> {
        if segments.is_empty() {
            return Ok(0);
        }

        let mut body = String::new();
        for segment in segments {
            let action = json!({ "index": { "_index": self.index, "_id": segment.id } });
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&serde_json::to_string(segment)?);
            body.push('\n');
        }

        let response = self
            .client
            .post(self.url("_bulk?refresh=true")?)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(MinneError::SearchIndex(format!(
                "Bulk indexing failed: {} {}",
                status, text
            )));
        }

        let parsed: BulkResponse = response.json().await?;
        if parsed.errors {
            let failed = parsed
                .items
                .iter()
                .filter(|item| {
                    item.get("index")
                        .and_then(|i| i.get("error"))
                        .is_some()
                })
                .count();
            error!("Bulk indexing had {} errors", failed);
            return Err(MinneError::SearchIndex(format!(
                "Bulk indexing failed for {} documents",
                failed
            )));
        }

        debug!("Indexed {} segments", segments.len());
        Ok(segments.len())
    }

    async fn lexical_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let body = json!({
            "size": limit,
            "query": {
                "match": { "text": { "query": query } }
            }
        });
        self.search(body).await
    }

    async fn vector_search(&self, embedding: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let body = json!({
            "size": limit,
            "min_score": KNN_MIN_SCORE,
            "query": {
                "knn": {
                    "embedding": {
                        "vector": embedding,
                        "k": limit
                    }
                }
            }
        });
        self.search(body).await
    }

    #[instrument(skip(self))]
    async fn delete_by_video(&self, video_id: Uuid) -> Result<usize> {
        let body = json!({
            "query": {
                "term": { "video_id": video_id }
            }
        });

        let response = self
            .client
            .post(self.url(&format!("{}/_delete_by_query?refresh=true", self.index))?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(MinneError::SearchIndex(format!(
                "Delete by video failed: {} {}",
                status, text
            )));
        }

        let parsed: DeleteByQueryResponse = response.json().await?;
        info!("Deleted {} segments for video {}", parsed.deleted, video_id);
        Ok(parsed.deleted)
    }
}
