//! Reciprocal Rank Fusion of lexical and vector result lists.

use super::{IndexedSegment, SearchHit};
use std::collections::HashMap;
use uuid::Uuid;

/// Smoothing constant; dampens the advantage of top ranks.
pub const RRF_K: f64 = 60.0;

/// A document with its combined reciprocal-rank score.
#[derive(Debug, Clone)]
pub struct FusedHit {
    pub segment: IndexedSegment,
    pub score: f64,
}

/// Fuse two ranked lists: each appearance contributes 1 / (k + rank) with
/// 1-based ranks, summed per document. Documents present in both lists
/// outscore single-list documents at comparable ranks. When a document
/// appears in both lists the later payload wins.
pub fn reciprocal_rank_fusion(lexical: &[SearchHit], vector: &[SearchHit]) -> Vec<FusedHit> {
    let mut scores: HashMap<Uuid, f64> = HashMap::new();
    let mut segments: HashMap<Uuid, IndexedSegment> = HashMap::new();

    for (rank, hit) in lexical.iter().enumerate() {
        *scores.entry(hit.segment.id).or_insert(0.0) += 1.0 / (RRF_K + (rank + 1) as f64);
        segments.insert(hit.segment.id, hit.segment.clone());
    }
    for (rank, hit) in vector.iter().enumerate() {
        *scores.entry(hit.segment.id).or_insert(0.0) += 1.0 / (RRF_K + (rank + 1) as f64);
        segments.insert(hit.segment.id, hit.segment.clone());
    }

    let mut fused: Vec<FusedHit> = scores
        .into_iter()
        .map(|(id, score)| FusedHit {
            segment: segments
                .remove(&id)
                .expect("every scored id has a payload"),
            score,
        })
        .collect();
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    fused
}

#[cfg(test)]
mod tests {
    use super::super::test_segment;
    use super::*;

    fn hit(segment: IndexedSegment, score: f64) -> SearchHit {
        SearchHit { segment, score }
    }

    #[test]
    fn test_document_in_both_lists_outranks_single_list_top() {
        let shared = test_segment("A", "shared", 0.0, vec![]);
        let lex_only = test_segment("B", "lexical only", 0.0, vec![]);
        let vec_only = test_segment("C", "vector only", 0.0, vec![]);

        let lexical = vec![hit(lex_only.clone(), 9.0), hit(shared.clone(), 5.0)];
        let vector = vec![hit(vec_only.clone(), 0.99), hit(shared.clone(), 0.80)];

        let fused = reciprocal_rank_fusion(&lexical, &vector);

        assert_eq!(fused.len(), 3);
        assert_eq!(fused[0].segment.id, shared.id);
        let expected = 1.0 / (RRF_K + 2.0) + 1.0 / (RRF_K + 2.0);
        assert!((fused[0].score - expected).abs() < 1e-12);
        // Single-list docs at rank 1 score 1/(k+1).
        assert!((fused[1].score - 1.0 / (RRF_K + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_fusion_ignores_backend_scores() {
        // Only ranks matter: swapping the raw scores changes nothing.
        let a = test_segment("A", "first", 0.0, vec![]);
        let b = test_segment("B", "second", 0.0, vec![]);

        let high = vec![hit(a.clone(), 100.0), hit(b.clone(), 50.0)];
        let low = vec![hit(a.clone(), 0.2), hit(b.clone(), 0.1)];

        let fused_high = reciprocal_rank_fusion(&high, &[]);
        let fused_low = reciprocal_rank_fusion(&low, &[]);

        assert_eq!(fused_high[0].segment.id, fused_low[0].segment.id);
        assert!((fused_high[0].score - fused_low[0].score).abs() < 1e-12);
    }

    #[test]
    fn test_fusion_is_symmetric_in_list_order() {
        let a = test_segment("A", "first", 0.0, vec![]);
        let b = test_segment("B", "second", 0.0, vec![]);

        let lexical = vec![hit(a.clone(), 1.0)];
        let vector = vec![hit(b.clone(), 1.0), hit(a.clone(), 0.5)];

        let forward = reciprocal_rank_fusion(&lexical, &vector);
        let reversed = reciprocal_rank_fusion(&vector, &lexical);

        assert_eq!(forward.len(), reversed.len());
        for (f, r) in forward.iter().zip(&reversed) {
            assert_eq!(f.segment.id, r.segment.id);
            assert!((f.score - r.score).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_lists_fuse_to_nothing() {
        assert!(reciprocal_rank_fusion(&[], &[]).is_empty());
    }
}
