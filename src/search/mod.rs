//! Hybrid retrieval over indexed transcript chunks.
//!
//! Provides a trait-based interface for search backends plus the fusion and
//! relevance-gating logic shared by all of them.

mod fusion;
mod memory;
mod opensearch;
mod relevance;

pub use fusion::{reciprocal_rank_fusion, FusedHit, RRF_K};
pub use memory::MemoryIndex;
pub use opensearch::OpenSearchIndex;
pub use relevance::{has_keyword_overlap, passes_relevance_gate, MIN_RELEVANCE_SCORE};

use crate::embedding::Embedder;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

/// A transcript chunk as stored in the search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedSegment {
    /// Segment ID, shared with the relational store.
    pub id: Uuid,
    pub video_id: Uuid,
    pub video_title: String,
    pub transcript_id: Uuid,
    /// Chunk text searched lexically.
    pub text: String,
    /// Chunk embedding searched by vector similarity.
    pub embedding: Vec<f32>,
    pub start_time: f64,
    pub end_time: f64,
    pub speaker: Option<String>,
    pub recording_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A raw backend hit: the document plus which list produced it.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub segment: IndexedSegment,
    /// Backend relevance score, not comparable across backends.
    pub score: f64,
}

/// A fused result returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub segment_id: Uuid,
    pub video_id: Uuid,
    pub video_title: String,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub speaker: Option<String>,
    /// Combined reciprocal-rank score.
    pub score: f64,
    /// Start time rendered as M:SS for display and citation.
    pub timestamp_formatted: String,
}

/// Trait for search index backends.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Index or overwrite a batch of segments.
    async fn bulk_upsert(&self, segments: &[IndexedSegment]) -> Result<usize>;

    /// Full-text search over segment text, best first.
    async fn lexical_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// Vector similarity search, best first.
    async fn vector_search(&self, embedding: &[f32], limit: usize) -> Result<Vec<SearchHit>>;

    /// Remove every segment belonging to a video.
    async fn delete_by_video(&self, video_id: Uuid) -> Result<usize>;
}

/// Render seconds as M:SS (minutes unpadded, seconds two digits).
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let minutes = total_seconds / 60;
    let secs = total_seconds % 60;
    format!("{}:{:02}", minutes, secs)
}

/// Run lexical and vector search for a query and fuse the ranked lists.
///
/// Blank queries return no results without touching the embedder or the
/// index. Both searches run concurrently, each retrieving `limit`
/// candidates before fusion truncates back to `limit`.
#[instrument(skip(index, embedder), fields(limit = limit))]
pub async fn hybrid_search(
    index: &dyn SearchIndex,
    embedder: &dyn Embedder,
    query: &str,
    limit: usize,
) -> Result<Vec<SearchResult>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let query_embedding = embedder.embed(query).await?;

    let (lexical, vector) = futures::try_join!(
        index.lexical_search(query, limit),
        index.vector_search(&query_embedding, limit),
    )?;
    debug!(
        "Retrieved {} lexical and {} vector hits",
        lexical.len(),
        vector.len()
    );

    let mut fused = reciprocal_rank_fusion(&lexical, &vector);
    fused.truncate(limit);

    Ok(fused
        .into_iter()
        .map(|hit| SearchResult {
            timestamp_formatted: format_timestamp(hit.segment.start_time),
            segment_id: hit.segment.id,
            video_id: hit.segment.video_id,
            video_title: hit.segment.video_title,
            text: hit.segment.text,
            start_time: hit.segment.start_time,
            end_time: hit.segment.end_time,
            speaker: hit.segment.speaker,
            score: hit.score,
        })
        .collect())
}

#[cfg(test)]
pub(crate) fn test_segment(video_title: &str, text: &str, start: f64, embedding: Vec<f32>) -> IndexedSegment {
    IndexedSegment {
        id: Uuid::new_v4(),
        video_id: Uuid::new_v4(),
        video_title: video_title.to_string(),
        transcript_id: Uuid::new_v4(),
        text: text.to_string(),
        embedding,
        start_time: start,
        end_time: start + 30.0,
        speaker: Some("SPEAKER_00".to_string()),
        recording_date: None,
        created_at: Utc::now(),
    }
}
