//! Embedding-based semantic chunker.
//!
//! Boundaries are placed where the cosine similarity of consecutive segment
//! embeddings drops below a threshold, then chunks are merged or split to
//! respect the configured word-count bounds.

use super::{count_tokens, Chunk, ChunkingConfig, SourceSegment, DEFAULT_SPEAKER};
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Embedding-similarity semantic chunker.
pub struct SemanticChunker {
    embedder: Arc<dyn Embedder>,
    config: ChunkingConfig,
}

/// A chunk under construction, carrying the speaker labels of all member
/// segments so the majority speaker can be recomputed after merges.
#[derive(Debug, Clone)]
struct WorkingChunk {
    text: String,
    start_time: f64,
    end_time: f64,
    speakers: Vec<String>,
}

/// A chunk after speaker resolution, before size-bound splitting.
#[derive(Debug, Clone)]
struct SizedChunk {
    text: String,
    start_time: f64,
    end_time: f64,
    speaker: String,
}

impl SemanticChunker {
    /// Create a chunker over the given embedder.
    pub fn new(embedder: Arc<dyn Embedder>, config: ChunkingConfig) -> Self {
        Self { embedder, config }
    }

    /// Group transcript segments into semantically coherent chunks.
    ///
    /// Output chunks cover exactly the input text (regrouped, never
    /// dropped) and carry a fresh embedding of their final text.
    #[instrument(skip_all, fields(segments = segments.len()))]
    pub async fn chunk(&self, segments: &[SourceSegment]) -> Result<Vec<Chunk>> {
        if segments.is_empty() {
            return Ok(Vec::new());
        }

        if segments.len() == 1 {
            let seg = &segments[0];
            let embeddings = self.embedder.embed_batch(&[seg.text.clone()]).await?;
            return Ok(vec![Chunk {
                text: seg.text.clone(),
                start_time: seg.start_time,
                end_time: seg.end_time,
                speaker: speaker_label(&seg.speaker),
                embedding: embeddings.into_iter().next().unwrap_or_default(),
            }]);
        }

        // Embed each segment in one batched call.
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        // Mark a boundary before segment i+1 whenever the similarity of the
        // consecutive pair drops below the threshold.
        let mut boundaries = HashSet::new();
        for i in 0..embeddings.len().saturating_sub(1) {
            let sim = cosine_similarity(&embeddings[i], &embeddings[i + 1]);
            if sim < self.config.similarity_threshold {
                boundaries.insert(i + 1);
            }
        }
        debug!("Placed {} similarity boundaries", boundaries.len());

        // Group segments between boundaries into initial chunks.
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut current_group = vec![0];
        for i in 1..segments.len() {
            if boundaries.contains(&i) {
                groups.push(std::mem::take(&mut current_group));
            }
            current_group.push(i);
        }
        groups.push(current_group);

        let chunks = build_chunks_from_groups(segments, &groups);
        let chunks = merge_small_chunks(chunks, self.config.min_chunk_tokens);

        let sized: Vec<SizedChunk> = chunks
            .into_iter()
            .map(|c| SizedChunk {
                speaker: majority_speaker(&c.speakers),
                text: c.text,
                start_time: c.start_time,
                end_time: c.end_time,
            })
            .collect();

        let split = split_large_chunks(sized, self.config.max_chunk_tokens);

        // Re-embed the final chunk texts in one batched call.
        let final_texts: Vec<String> = split.iter().map(|c| c.text.clone()).collect();
        let final_embeddings = self.embedder.embed_batch(&final_texts).await?;

        let result: Vec<Chunk> = split
            .into_iter()
            .zip(final_embeddings)
            .map(|(c, embedding)| Chunk {
                text: c.text,
                start_time: c.start_time,
                end_time: c.end_time,
                speaker: c.speaker,
                embedding,
            })
            .collect();

        info!(
            "Semantic chunking: {} segments -> {} chunks",
            segments.len(),
            result.len()
        );
        Ok(result)
    }
}

fn speaker_label(speaker: &Option<String>) -> String {
    match speaker {
        Some(s) if !s.is_empty() => s.clone(),
        _ => DEFAULT_SPEAKER.to_string(),
    }
}

/// Build initial chunks from segment index groups.
fn build_chunks_from_groups(segments: &[SourceSegment], groups: &[Vec<usize>]) -> Vec<WorkingChunk> {
    groups
        .iter()
        .map(|group| {
            let members: Vec<&SourceSegment> = group.iter().map(|&i| &segments[i]).collect();
            let text = members
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            WorkingChunk {
                text,
                start_time: members[0].start_time,
                end_time: members[members.len() - 1].end_time,
                speakers: members.iter().map(|s| speaker_label(&s.speaker)).collect(),
            }
        })
        .collect()
}

/// Return the most common speaker label, ties broken by first encounter.
fn majority_speaker(speakers: &[String]) -> String {
    if speakers.is_empty() {
        return DEFAULT_SPEAKER.to_string();
    }

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for speaker in speakers {
        match counts.iter_mut().find(|(label, _)| *label == speaker) {
            Some((_, n)) => *n += 1,
            None => counts.push((speaker, 1)),
        }
    }

    let mut best = counts[0];
    for &candidate in &counts[1..] {
        if candidate.1 > best.1 {
            best = candidate;
        }
    }
    best.0.to_string()
}

/// Merge chunks smaller than `min_tokens` with a neighbor.
///
/// Single left-to-right pass: a small chunk merges backward into the
/// previous output chunk when one exists, otherwise forward into the next
/// working chunk. Merged chunks are not re-checked against the minimum, so
/// an undersized chunk can survive.
fn merge_small_chunks(chunks: Vec<WorkingChunk>, min_tokens: usize) -> Vec<WorkingChunk> {
    if chunks.len() <= 1 {
        return chunks;
    }

    let mut chunks = chunks;
    let mut merged: Vec<WorkingChunk> = Vec::new();
    let mut i = 0;
    while i < chunks.len() {
        let small = count_tokens(&chunks[i].text) < min_tokens;
        if small && !merged.is_empty() {
            let chunk = chunks[i].clone();
            let prev = merged.last_mut().expect("merged is non-empty");
            prev.text = format!("{} {}", prev.text, chunk.text);
            prev.end_time = chunk.end_time;
            prev.speakers.extend(chunk.speakers);
        } else if small && merged.is_empty() && i + 1 < chunks.len() {
            let chunk = chunks[i].clone();
            let next = &mut chunks[i + 1];
            next.text = format!("{} {}", chunk.text, next.text);
            next.start_time = chunk.start_time;
            let mut speakers = chunk.speakers;
            speakers.append(&mut next.speakers);
            next.speakers = speakers;
        } else {
            merged.push(chunks[i].clone());
        }
        i += 1;
    }

    merged
}

/// Split chunks exceeding `max_tokens` at sentence boundaries, packing
/// sentences greedily into sub-chunks. A single sentence longer than the
/// limit passes through whole.
fn split_large_chunks(chunks: Vec<SizedChunk>, max_tokens: usize) -> Vec<SizedChunk> {
    let mut result = Vec::new();

    for chunk in chunks {
        if count_tokens(&chunk.text) <= max_tokens {
            result.push(chunk);
            continue;
        }

        let sentences = split_sentences(&chunk.text);
        let mut sub_chunks: Vec<String> = Vec::new();
        let mut current_text = String::new();

        for sentence in sentences {
            let candidate = if current_text.is_empty() {
                sentence.clone()
            } else {
                format!("{} {}", current_text, sentence).trim().to_string()
            };
            if count_tokens(&candidate) > max_tokens && !current_text.is_empty() {
                sub_chunks.push(std::mem::replace(&mut current_text, sentence));
            } else {
                current_text = candidate;
            }
        }
        if !current_text.is_empty() {
            sub_chunks.push(current_text);
        }

        // Distribute timestamps proportionally to each sub-chunk's share of
        // the original chunk's token count.
        let total_duration = chunk.end_time - chunk.start_time;
        let total_tokens = count_tokens(&chunk.text);
        let sub_count = sub_chunks.len();
        let mut time_offset = chunk.start_time;

        for sub_text in sub_chunks {
            let sub_tokens = count_tokens(&sub_text);
            let proportion = if total_tokens > 0 {
                sub_tokens as f64 / total_tokens as f64
            } else {
                1.0 / sub_count as f64
            };
            let sub_duration = total_duration * proportion;

            result.push(SizedChunk {
                text: sub_text,
                start_time: time_offset,
                end_time: time_offset + sub_duration,
                speaker: chunk.speaker.clone(),
            });
            time_offset += sub_duration;
        }
    }

    result
}

/// Split text into sentences at `.`, `!` or `?` followed by whitespace.
///
/// The separating whitespace run is consumed, matching a split on
/// punctuation-then-whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }

    sentences
}
