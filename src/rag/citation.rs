//! Citation extraction and resolution.
//!
//! Answers cite sources as `[Video Title @ MM:SS]`. Each marker is resolved
//! against the retrieval results that grounded the answer; markers that
//! match nothing are dropped silently rather than failing the answer.

use crate::search::SearchResult;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use uuid::Uuid;

static CITATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+?)\s*@\s*(\d{1,2}:\d{2})\]").expect("valid regex"));

/// A resolved citation pointing into a specific video.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub video_id: Uuid,
    pub video_title: String,
    /// Cited position in seconds.
    pub timestamp: f64,
    /// Text of the retrieved chunk closest to the cited position.
    pub text: String,
}

/// Convert an M:SS or MM:SS string to seconds.
pub fn mmss_to_seconds(mmss: &str) -> f64 {
    let mut parts = mmss.split(':');
    let minutes: u64 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let seconds: u64 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (minutes * 60 + seconds) as f64
}

/// Match a cited title against the titles present in the results.
///
/// Models abbreviate titles, so after the exact and case-insensitive exact
/// attempts a substring match is tried ("Standup" for "Monday Standup").
/// When every result comes from one video, an unmatched title still
/// resolves to it.
fn match_video_title(cited_title: &str, titles: &[(String, Uuid)]) -> Option<Uuid> {
    if let Some((_, id)) = titles.iter().find(|(title, _)| title == cited_title) {
        return Some(*id);
    }

    let cited_lower = cited_title.to_lowercase();
    if let Some((_, id)) = titles
        .iter()
        .find(|(title, _)| title.to_lowercase() == cited_lower)
    {
        return Some(*id);
    }

    if let Some((_, id)) = titles
        .iter()
        .find(|(title, _)| title.to_lowercase().contains(&cited_lower))
    {
        return Some(*id);
    }

    let unique_ids: HashSet<Uuid> = titles.iter().map(|(_, id)| *id).collect();
    if unique_ids.len() == 1 {
        return unique_ids.into_iter().next();
    }

    None
}

/// Extract `[Video Title @ MM:SS]` markers from an answer and resolve each
/// against the retrieval results.
pub fn extract_citations(response_text: &str, search_results: &[SearchResult]) -> Vec<Citation> {
    let mut titles: Vec<(String, Uuid)> = Vec::new();
    for result in search_results {
        match titles.iter_mut().find(|(t, _)| *t == result.video_title) {
            Some(entry) => entry.1 = result.video_id,
            None => titles.push((result.video_title.clone(), result.video_id)),
        }
    }

    let mut citations = Vec::new();
    for caps in CITATION_PATTERN.captures_iter(response_text) {
        let cited_title = caps[1].to_string();
        let Some(video_id) = match_video_title(&cited_title, &titles) else {
            continue;
        };
        let timestamp = mmss_to_seconds(&caps[2]);

        // Attach the chunk whose start time is closest to the citation.
        let mut text = String::new();
        let mut resolved_title = cited_title;
        let mut best_dist = f64::INFINITY;
        for result in search_results {
            if result.video_id == video_id {
                let dist = (result.start_time - timestamp).abs();
                if dist < best_dist {
                    best_dist = dist;
                    text = result.text.clone();
                    resolved_title = result.video_title.clone();
                }
            }
        }

        citations.push(Citation {
            video_id,
            video_title: resolved_title,
            timestamp,
            text,
        });
    }

    citations
}

/// Drop repeat citations of the same video and timestamp, keeping the
/// first occurrence in order.
pub fn deduplicate_citations(citations: Vec<Citation>) -> Vec<Citation> {
    let mut seen: HashSet<(Uuid, u64)> = HashSet::new();
    citations
        .into_iter()
        .filter(|c| seen.insert((c.video_id, c.timestamp.to_bits())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(video_id: Uuid, title: &str, text: &str, start: f64) -> SearchResult {
        SearchResult {
            segment_id: Uuid::new_v4(),
            video_id,
            video_title: title.to_string(),
            text: text.to_string(),
            start_time: start,
            end_time: start + 30.0,
            speaker: None,
            score: 0.03,
            timestamp_formatted: crate::search::format_timestamp(start),
        }
    }

    #[test]
    fn test_mmss_to_seconds() {
        assert_eq!(mmss_to_seconds("0:45"), 45.0);
        assert_eq!(mmss_to_seconds("2:05"), 125.0);
        assert_eq!(mmss_to_seconds("10:30"), 630.0);
    }

    #[test]
    fn test_extract_and_resolve_citation() {
        let video = Uuid::new_v4();
        let results = vec![
            result(video, "Monday Standup", "we froze the API surface", 120.0),
            result(video, "Monday Standup", "unrelated banter", 500.0),
        ];

        let citations =
            extract_citations("The API was frozen [Monday Standup @ 2:05].", &results);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].video_id, video);
        assert_eq!(citations[0].timestamp, 125.0);
        // Closest chunk start wins the snippet.
        assert_eq!(citations[0].text, "we froze the API surface");
    }

    #[test]
    fn test_abbreviated_title_resolves_by_substring() {
        let video = Uuid::new_v4();
        let results = vec![result(video, "Backdrop CMS Weekly Meeting", "notes", 60.0)];

        let citations = extract_citations("See [weekly meeting @ 1:00].", &results);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].video_title, "Backdrop CMS Weekly Meeting");
    }

    #[test]
    fn test_unmatched_title_falls_back_to_single_video() {
        let video = Uuid::new_v4();
        let results = vec![result(video, "Planning", "scope talk", 30.0)];

        let citations = extract_citations("As noted in [Q3 Review @ 0:45].", &results);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].video_id, video);
    }

    #[test]
    fn test_unmatched_title_with_multiple_videos_is_skipped() {
        let results = vec![
            result(Uuid::new_v4(), "Planning", "scope", 30.0),
            result(Uuid::new_v4(), "Retro", "vibes", 30.0),
        ];

        let citations = extract_citations("As noted in [Q3 Review @ 0:45].", &results);
        assert!(citations.is_empty());
    }

    #[test]
    fn test_deduplicate_keeps_first_occurrence() {
        let video = Uuid::new_v4();
        let other = Uuid::new_v4();
        let citations = vec![
            Citation {
                video_id: video,
                video_title: "A".to_string(),
                timestamp: 125.0,
                text: "first".to_string(),
            },
            Citation {
                video_id: video,
                video_title: "A".to_string(),
                timestamp: 125.0,
                text: "second".to_string(),
            },
            Citation {
                video_id: other,
                video_title: "B".to_string(),
                timestamp: 125.0,
                text: "different video".to_string(),
            },
        ];

        let deduped = deduplicate_citations(citations);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].text, "first");
        assert_eq!(deduped[1].text, "different video");
    }

    #[test]
    fn test_malformed_markers_are_ignored() {
        let results = vec![result(Uuid::new_v4(), "Standup", "text", 0.0)];
        assert!(extract_citations("no brackets at 2:05 here", &results).is_empty());
        assert!(extract_citations("[Standup @ 125]", &results).is_empty());
        assert!(extract_citations("[Standup @ 123:45]", &results).is_empty());
    }
}
