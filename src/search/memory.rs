//! In-memory search index.
//!
//! Useful for testing and for small archives without an OpenSearch
//! deployment.

use super::{IndexedSegment, SearchHit, SearchIndex};
use crate::embedding::cosine_similarity;
use crate::error::{MinneError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

type Segments = HashMap<Uuid, IndexedSegment>;

/// In-memory search index.
pub struct MemoryIndex {
    segments: RwLock<Segments>,
}

impl MemoryIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self {
            segments: RwLock::new(HashMap::new()),
        }
    }

    /// Number of indexed segments.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_segments()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read_segments(&self) -> Result<RwLockReadGuard<'_, Segments>> {
        self.segments
            .read()
            .map_err(|e| MinneError::SearchIndex(format!("Index lock poisoned: {}", e)))
    }

    fn write_segments(&self) -> Result<RwLockWriteGuard<'_, Segments>> {
        self.segments
            .write()
            .map_err(|e| MinneError::SearchIndex(format!("Index lock poisoned: {}", e)))
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn bulk_upsert(&self, segments: &[IndexedSegment]) -> Result<usize> {
        let mut store = self.write_segments()?;
        for segment in segments {
            store.insert(segment.id, segment.clone());
        }
        Ok(segments.len())
    }

    async fn lexical_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let store = self.read_segments()?;
        let terms: Vec<String> = query.split_whitespace().map(|t| t.to_lowercase()).collect();

        let mut hits: Vec<SearchHit> = store
            .values()
            .filter_map(|segment| {
                let text = segment.text.to_lowercase();
                let matched = terms.iter().filter(|t| text.contains(t.as_str())).count();
                if matched == 0 {
                    return None;
                }
                Some(SearchHit {
                    segment: segment.clone(),
                    score: matched as f64,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn vector_search(&self, embedding: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let store = self.read_segments()?;

        let mut hits: Vec<SearchHit> = store
            .values()
            .map(|segment| SearchHit {
                score: cosine_similarity(embedding, &segment.embedding) as f64,
                segment: segment.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_by_video(&self, video_id: Uuid) -> Result<usize> {
        let mut store = self.write_segments()?;
        let initial_len = store.len();
        store.retain(|_, segment| segment.video_id != video_id);
        Ok(initial_len - store.len())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{hybrid_search, test_segment};
    use super::*;
    use crate::embedding::Embedder;

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.to_lowercase().contains("deploy") {
                Ok(vec![0.0, 1.0])
            } else {
                Ok(vec![1.0, 0.0])
            }
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn test_lexical_search_requires_a_term_match() {
        let index = MemoryIndex::new();
        index
            .bulk_upsert(&[
                test_segment("Infra Sync", "we ran the Alembic migration today", 12.0, vec![1.0, 0.0]),
                test_segment("Infra Sync", "lunch plans for friday", 80.0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = index.lexical_search("alembic migration", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].segment.text.contains("Alembic"));
    }

    #[tokio::test]
    async fn test_rare_exact_term_surfaces_via_lexical_list() {
        // The distinctive term only matches lexically; its embedding points
        // away from the query's, so the vector list alone would bury it.
        let index = MemoryIndex::new();
        let alembic = test_segment(
            "Infra Sync",
            "the Alembic migration needs a manual revision",
            12.0,
            vec![1.0, 0.0],
        );
        index
            .bulk_upsert(&[
                alembic.clone(),
                test_segment("Infra Sync", "deploy pipeline is green", 40.0, vec![0.0, 1.0]),
                test_segment("Infra Sync", "deploy went out at noon", 70.0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = hybrid_search(&index, &AxisEmbedder, "Alembic deploy status", 10)
            .await
            .unwrap();

        assert!(results.iter().any(|r| r.segment_id == alembic.id));
        let top = &results[0];
        assert_eq!(top.timestamp_formatted, super::super::format_timestamp(top.start_time));
    }

    #[tokio::test]
    async fn test_delete_by_video_removes_only_that_video() {
        let index = MemoryIndex::new();
        let keep = test_segment("A", "stays", 0.0, vec![1.0, 0.0]);
        let gone = test_segment("B", "goes", 0.0, vec![1.0, 0.0]);
        index.bulk_upsert(&[keep.clone(), gone.clone()]).await.unwrap();

        let removed = index.delete_by_video(gone.video_id).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(index.len().unwrap(), 1);

        let hits = index.lexical_search("stays", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].segment.id, keep.id);
    }

    #[tokio::test]
    async fn test_poisoned_lock_is_an_error_not_a_panic() {
        let index = std::sync::Arc::new(MemoryIndex::new());

        let poisoner = index.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.segments.write().unwrap();
            panic!("holding the index lock");
        })
        .join();

        let err = index.lexical_search("anything", 10).await.unwrap_err();
        assert!(matches!(err, MinneError::SearchIndex(_)));
        assert!(index.len().is_err());
    }
}
