//! Relevance gating for retrieved context.
//!
//! Fused rank scores are small and dense, so a score floor alone lets
//! marginal hits through. The keyword overlap check catches hits that only
//! looked relevant to the embedding model.

use super::SearchResult;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Minimum fused score for a result to count as relevant. A single-list
/// appearance at the best rank scores 1/61, so this floor only drops
/// documents buried deep in both lists.
pub const MIN_RELEVANCE_SCORE: f64 = 0.005;

/// Function words and generic discourse verbs excluded from the keyword
/// overlap check.
static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    "a an the is are was were be been being do does did have has had \
     will would shall should can could may might must \
     i me my we our us you your he she it they them their \
     this that these those what which who whom how when where why \
     in on at to for of with by from up out about into over after \
     and or but not so if then than too also very \
     discuss discussed talk talked said tell told meeting \
     any some all each every no"
        .split_whitespace()
        .collect()
});

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]+").expect("valid regex"));

/// Check whether any distinctive query term appears in the result texts.
///
/// Terms are lowercased alphabetic runs of at least three characters,
/// minus stop words. A query with no distinctive terms passes, since
/// overlap cannot be judged. Otherwise at least one term must occur as a
/// substring of the combined result text.
pub fn has_keyword_overlap(query: &str, results: &[SearchResult]) -> bool {
    let query_terms: HashSet<String> = WORD_RE
        .find_iter(query)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| t.len() >= 3 && !STOP_WORDS.contains(t.as_str()))
        .collect();

    if query_terms.is_empty() {
        return true;
    }

    let combined_text = results
        .iter()
        .map(|r| r.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    query_terms.iter().any(|term| combined_text.contains(term))
}

/// Apply the full relevance gate: score floor, then keyword overlap.
///
/// Returns the surviving results; the overlap check failing drops all of
/// them, treating the whole batch as a false positive.
pub fn passes_relevance_gate(query: &str, results: Vec<SearchResult>) -> Vec<SearchResult> {
    let filtered: Vec<SearchResult> = results
        .into_iter()
        .filter(|r| r.score >= MIN_RELEVANCE_SCORE)
        .collect();

    if !filtered.is_empty() && !has_keyword_overlap(query, &filtered) {
        return Vec::new();
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn result(text: &str, score: f64) -> SearchResult {
        SearchResult {
            segment_id: Uuid::new_v4(),
            video_id: Uuid::new_v4(),
            video_title: "Weekly Sync".to_string(),
            text: text.to_string(),
            start_time: 0.0,
            end_time: 30.0,
            speaker: None,
            score,
            timestamp_formatted: "0:00".to_string(),
        }
    }

    #[test]
    fn test_score_floor_drops_weak_hits() {
        let results = vec![
            result("we discussed the quarterly roadmap", 0.016),
            result("barely related aside", 0.004),
        ];
        let kept = passes_relevance_gate("quarterly roadmap", results);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "we discussed the quarterly roadmap");
    }

    #[test]
    fn test_no_keyword_overlap_drops_everything() {
        // Semantically adjacent but the distinctive term never appears.
        let results = vec![
            result("the database schema changed last week", 0.02),
            result("we updated the table definitions", 0.02),
        ];
        let kept = passes_relevance_gate("did anyone mention kubernetes", results);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_stop_word_only_query_skips_overlap_check() {
        let results = vec![result("completely unrelated text", 0.02)];
        // Every term is a stop word or shorter than three letters.
        let kept = passes_relevance_gate("what did they discuss", results);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_overlap_is_case_insensitive_substring() {
        let results = vec![result("We migrated to PostgreSQL twelve.", 0.02)];
        assert!(has_keyword_overlap("postgresql migration plans", &results));
        // "migration" matches nothing but "postgresql" does.
        let kept = passes_relevance_gate("postgresql migration plans", results);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_discourse_verbs_are_stop_words() {
        let results = vec![result("the budget forecast", 0.02)];
        assert!(has_keyword_overlap("who talked about the meeting", &results));
    }
}
