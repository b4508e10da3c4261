//! The question-answering engine: retrieve, gate, prompt, cite.

use super::citation::{deduplicate_citations, extract_citations, Citation};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::oracle::AnswerOracle;
use crate::search::{hybrid_search, passes_relevance_gate, SearchIndex, SearchResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Context truncation limit, roughly 8000 tokens.
pub const MAX_CONTEXT_CHARS: usize = 32_000;

/// Canned reply when retrieval produces nothing relevant. The oracle is
/// never invoked in that case.
pub const NO_RESULTS_MESSAGE: &str = "I couldn't find any relevant information about that topic \
     in the video archive. Try rephrasing your question or asking \
     about a different topic.";

const ANSWER_PROMPT: &str = "You are a helpful assistant with access to a video knowledge base.\n\
     \n\
     Relevant video segments (JSON):\n\
     {context}\n\
     \n\
     Each segment has video_id, video_title, timestamp (seconds), text, and speaker.\n\
     \n\
     User question: {question}\n\
     \n\
     Instructions:\n\
     - Answer based only on the segments above\n\
     - Cite sources using the EXACT video_title in [Video Title @ MM:SS] format\n\
     - If the segments don't contain relevant information, say so clearly\n\
     - Be concise but thorough";

/// An answer grounded in retrieved chunks.
#[derive(Debug, Serialize)]
pub struct GroundedAnswer {
    pub message: String,
    pub citations: Vec<Citation>,
    /// The retrieval results the answer was grounded in.
    pub sources: Vec<SearchResult>,
}

#[derive(Serialize)]
struct ContextSegment<'a> {
    video_id: uuid::Uuid,
    video_title: &'a str,
    timestamp: f64,
    text: &'a str,
    speaker: Option<&'a str>,
}

/// Question answering over the archive.
pub struct AnswerEngine {
    index: Arc<dyn SearchIndex>,
    embedder: Arc<dyn Embedder>,
    oracle: Arc<dyn AnswerOracle>,
    limit: usize,
}

impl AnswerEngine {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        embedder: Arc<dyn Embedder>,
        oracle: Arc<dyn AnswerOracle>,
        limit: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            oracle,
            limit,
        }
    }

    /// Answer a question with citations into the archive.
    #[instrument(skip(self, question))]
    pub async fn ask(&self, question: &str) -> Result<GroundedAnswer> {
        let results =
            hybrid_search(self.index.as_ref(), self.embedder.as_ref(), question, self.limit)
                .await?;
        let results = passes_relevance_gate(question, results);

        if results.is_empty() {
            info!("No relevant chunks found, returning canned response");
            return Ok(GroundedAnswer {
                message: NO_RESULTS_MESSAGE.to_string(),
                citations: Vec::new(),
                sources: Vec::new(),
            });
        }

        let context = build_context(&results)?;
        let prompt = ANSWER_PROMPT
            .replace("{question}", question)
            .replace("{context}", &context);
        debug!("Prompting oracle with {} grounding chunks", results.len());

        let message = self.oracle.answer(&prompt).await?;

        let citations = deduplicate_citations(extract_citations(&message, &results));
        info!("Answer cites {} distinct locations", citations.len());

        Ok(GroundedAnswer {
            message,
            citations,
            sources: results,
        })
    }
}

/// Serialize grounding chunks as JSON, truncated to the context budget.
fn build_context(results: &[SearchResult]) -> Result<String> {
    let truncated = truncate_context(results, MAX_CONTEXT_CHARS);
    let segments: Vec<ContextSegment> = truncated
        .iter()
        .map(|r| ContextSegment {
            video_id: r.video_id,
            video_title: &r.video_title,
            timestamp: r.start_time,
            text: &r.text,
            speaker: r.speaker.as_deref(),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&segments)?)
}

/// Return the prefix of results whose cumulative text length fits the
/// budget. The first result is always kept so one oversized chunk cannot
/// empty the context.
fn truncate_context(results: &[SearchResult], max_chars: usize) -> &[SearchResult] {
    let mut total = 0;
    for (i, result) in results.iter().enumerate() {
        let text_len = result.text.len();
        if total + text_len > max_chars && i > 0 {
            return &results[..i];
        }
        total += text_len;
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{IndexedSegment, MemoryIndex, SearchHit, SearchIndex};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    struct ScriptedOracle {
        response: String,
        calls: AtomicUsize,
    }

    impl ScriptedOracle {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AnswerOracle for ScriptedOracle {
        async fn answer(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn segment(video_id: Uuid, title: &str, text: &str, start: f64) -> IndexedSegment {
        IndexedSegment {
            id: Uuid::new_v4(),
            video_id,
            video_title: title.to_string(),
            transcript_id: Uuid::new_v4(),
            text: text.to_string(),
            embedding: vec![1.0, 0.0],
            start_time: start,
            end_time: start + 30.0,
            speaker: Some("SPEAKER_01".to_string()),
            recording_date: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_empty_archive_returns_canned_answer_without_oracle() {
        let oracle = Arc::new(ScriptedOracle::new("should never appear"));
        let engine = AnswerEngine::new(
            Arc::new(MemoryIndex::new()),
            Arc::new(FixedEmbedder),
            oracle.clone(),
            10,
        );

        let answer = engine.ask("what happened to the migration").await.unwrap();

        assert_eq!(answer.message, NO_RESULTS_MESSAGE);
        assert!(answer.citations.is_empty());
        assert!(answer.sources.is_empty());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_keyword_mismatch_returns_canned_answer_without_oracle() {
        let index = Arc::new(MemoryIndex::new());
        index
            .bulk_upsert(&[segment(
                Uuid::new_v4(),
                "Standup",
                "the database schema changed",
                0.0,
            )])
            .await
            .unwrap();

        let oracle = Arc::new(ScriptedOracle::new("should never appear"));
        let engine = AnswerEngine::new(index, Arc::new(FixedEmbedder), oracle.clone(), 10);

        // Vector similarity surfaces the chunk but the distinctive query
        // term never appears in it.
        let answer = engine.ask("anything about kubernetes").await.unwrap();

        assert_eq!(answer.message, NO_RESULTS_MESSAGE);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    /// Returns a fixed vector list so fused scores are pure rank scores.
    struct RankedIndex {
        segments: Vec<IndexedSegment>,
    }

    #[async_trait]
    impl SearchIndex for RankedIndex {
        async fn bulk_upsert(&self, segments: &[IndexedSegment]) -> Result<usize> {
            Ok(segments.len())
        }

        async fn lexical_search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
            Ok(Vec::new())
        }

        async fn vector_search(&self, _embedding: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
            Ok(self
                .segments
                .iter()
                .take(limit)
                .cloned()
                .map(|segment| SearchHit {
                    segment,
                    score: 1.0,
                })
                .collect())
        }

        async fn delete_by_video(&self, _video_id: uuid::Uuid) -> Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_below_floor_grounding_returns_canned_answer_without_oracle() {
        // The only chunk mentioning the query topic sits at rank 146, where
        // the fused rank score 1/(60 + 146) falls under the relevance floor.
        // The surviving higher-ranked chunks never mention the topic, so the
        // gate must drop the whole batch rather than answer from noise.
        let video_id = Uuid::new_v4();
        let mut segments: Vec<IndexedSegment> = (0..145)
            .map(|i| segment(video_id, "Weekly Sync", &format!("routine agenda item {}", i), i as f64))
            .collect();
        segments.push(segment(
            video_id,
            "Weekly Sync",
            "the kubernetes cluster needs a version bump",
            900.0,
        ));
        let index = Arc::new(RankedIndex { segments });

        let oracle = Arc::new(ScriptedOracle::new("should never appear"));
        let engine = AnswerEngine::new(index, Arc::new(FixedEmbedder), oracle.clone(), 150);

        let answer = engine.ask("kubernetes version").await.unwrap();

        assert_eq!(answer.message, NO_RESULTS_MESSAGE);
        assert!(answer.sources.is_empty());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_answer_carries_resolved_citations() {
        let video_id = Uuid::new_v4();
        let index = Arc::new(MemoryIndex::new());
        index
            .bulk_upsert(&[
                segment(video_id, "Monday Standup", "we froze the API surface", 120.0),
                segment(video_id, "Monday Standup", "deploy freeze until friday", 300.0),
            ])
            .await
            .unwrap();

        let oracle = Arc::new(ScriptedOracle::new(
            "The API surface was frozen [Monday Standup @ 2:05] and deploys \
             are paused [Monday Standup @ 5:00] [Monday Standup @ 2:05].",
        ));
        let engine = AnswerEngine::new(index, Arc::new(FixedEmbedder), oracle.clone(), 10);

        let answer = engine.ask("what happened to the API freeze").await.unwrap();

        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
        assert_eq!(answer.citations.len(), 2);
        assert_eq!(answer.citations[0].timestamp, 125.0);
        assert_eq!(answer.citations[0].text, "we froze the API surface");
        assert_eq!(answer.citations[1].timestamp, 300.0);
        assert!(!answer.sources.is_empty());
    }

    #[test]
    fn test_truncate_context_keeps_prefix_within_budget() {
        let make = |text: &str| SearchResult {
            segment_id: Uuid::new_v4(),
            video_id: Uuid::new_v4(),
            video_title: "T".to_string(),
            text: text.to_string(),
            start_time: 0.0,
            end_time: 1.0,
            speaker: None,
            score: 0.02,
            timestamp_formatted: "0:00".to_string(),
        };

        let results = vec![make("aaaaa"), make("bbbbb"), make("ccccc")];
        assert_eq!(truncate_context(&results, 11).len(), 2);
        assert_eq!(truncate_context(&results, 100).len(), 3);
        // An oversized first chunk is still kept.
        assert_eq!(truncate_context(&results, 3).len(), 1);
    }
}
