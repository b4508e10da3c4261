//! Semantic chunking of transcript segments.
//!
//! Groups raw per-utterance segments into coherent chunks using
//! embedding-similarity boundaries, then enforces size bounds.

mod semantic;

pub use semantic::SemanticChunker;

use serde::{Deserialize, Serialize};

/// Sentinel speaker label used when diarization produced nothing.
pub const DEFAULT_SPEAKER: &str = "SPEAKER_00";

/// A raw transcript segment fed into the chunker.
#[derive(Debug, Clone)]
pub struct SourceSegment {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub speaker: Option<String>,
}

/// A semantic chunk: a merged span of transcript text treated as one
/// retrievable and citable unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Majority speaker across member segments.
    pub speaker: String,
    pub embedding: Vec<f32>,
}

/// Configuration for semantic chunking.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Cosine similarity below which a chunk boundary is placed.
    pub similarity_threshold: f32,
    /// Minimum words per chunk; smaller chunks are merged with a neighbor.
    pub min_chunk_tokens: usize,
    /// Maximum words per chunk; larger chunks are split at sentence
    /// boundaries.
    pub max_chunk_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            min_chunk_tokens: 100,
            max_chunk_tokens: 500,
        }
    }
}

/// Approximate token count using whitespace split.
///
/// This is deliberately not a real tokenizer; size bounds downstream are
/// calibrated against this exact count.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}
