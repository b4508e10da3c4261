//! Transcription of extracted audio.
//!
//! Backends produce raw segments that may be missing timestamps or speaker
//! labels; normalization turns them into well-formed segments before
//! anything downstream sees them.

mod whisperx;

pub use whisperx::WhisperXTranscriber;

use crate::chunking::DEFAULT_SPEAKER;
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

/// A segment as emitted by a transcription backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSegment {
    pub start: Option<f64>,
    pub end: Option<f64>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub speaker: Option<String>,
}

/// Raw transcription output before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTranscription {
    #[serde(default)]
    pub segments: Vec<RawSegment>,
    #[serde(default)]
    pub language: Option<String>,
}

/// A normalized segment: trimmed non-empty text, both timestamps present,
/// speaker always labeled.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub speaker: String,
}

/// Trait for transcription backends.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file into raw segments.
    async fn transcribe(&self, audio_path: &Path) -> Result<RawTranscription>;
}

/// Normalize raw segments.
///
/// Segments with blank text or with neither timestamp are dropped. A
/// missing start or end is backfilled from the other endpoint. Missing or
/// empty speaker labels become [`DEFAULT_SPEAKER`].
pub fn normalize_segments(raw: &[RawSegment]) -> Vec<NormalizedSegment> {
    let mut segments = Vec::new();

    for seg in raw {
        let text = seg.text.trim();
        if text.is_empty() {
            continue;
        }

        let (start, end) = match (seg.start, seg.end) {
            (None, None) => continue,
            (Some(s), None) => (s, s),
            (None, Some(e)) => (e, e),
            (Some(s), Some(e)) => (s, e),
        };

        let speaker = match &seg.speaker {
            Some(s) if !s.is_empty() => s.clone(),
            _ => DEFAULT_SPEAKER.to_string(),
        };

        segments.push(NormalizedSegment {
            start,
            end,
            text: text.to_string(),
            speaker,
        });
    }

    segments
}

/// Sum of whitespace-separated words across segments.
pub fn word_count(segments: &[NormalizedSegment]) -> i64 {
    segments
        .iter()
        .map(|s| s.text.split_whitespace().count() as i64)
        .sum()
}
