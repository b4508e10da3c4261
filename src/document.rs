//! Summary document generation from transcripts.

use crate::error::Result;
use crate::model::GeneratedDocument;
use crate::oracle::AnswerOracle;
use crate::store::VideoStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Per-transcript context budget; full transcripts are long, so this is
/// larger than the answer-engine budget.
pub const DOC_CONTEXT_CHARS: usize = 64_000;

const DOCUMENT_PROMPT: &str = "Generate a summary document based on video transcript content.\n\
     \n\
     Source transcripts (JSON):\n\
     {context}\n\
     \n\
     User Request: {request}\n\
     \n\
     Instructions:\n\
     - Create a well-structured markdown document\n\
     - Include a title as the first line (# Title)\n\
     - Include sections as appropriate\n\
     - Cite timestamps for key points using [MM:SS] format\n\
     - Be comprehensive but avoid unnecessary repetition";

#[derive(Serialize)]
struct TranscriptContext {
    video_id: Uuid,
    video_title: String,
    text: String,
}

/// Extract a document title from markdown content.
///
/// The first markdown heading wins; otherwise the first non-empty line,
/// capped at 255 characters.
pub fn extract_title(content: &str) -> String {
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let heading = line.trim_start_matches('#');
        if heading.len() < line.len() && heading.starts_with(char::is_whitespace) {
            return heading.trim().to_string();
        }
        return line.chars().take(255).collect();
    }
    "Generated Document".to_string()
}

/// Generate and persist a summary document over the given videos.
///
/// With no video ids, every transcript in the archive is used.
#[instrument(skip(store, oracle, request))]
pub async fn generate_document(
    store: &VideoStore,
    oracle: Arc<dyn AnswerOracle>,
    request: &str,
    video_ids: &[Uuid],
) -> Result<GeneratedDocument> {
    let transcripts = if video_ids.is_empty() {
        store
            .list_videos()?
            .into_iter()
            .filter_map(|v| store.transcript_for_video(v.id).ok())
            .collect()
    } else {
        store.transcripts_for_videos(video_ids)?
    };

    let mut entries = Vec::with_capacity(transcripts.len());
    let mut resolved_ids = Vec::with_capacity(transcripts.len());
    for transcript in &transcripts {
        let title = store
            .get_video(transcript.video_id)
            .map(|v| v.title)
            .unwrap_or_else(|_| "Unknown".to_string());
        entries.push(TranscriptContext {
            video_id: transcript.video_id,
            video_title: title,
            text: transcript
                .full_text
                .chars()
                .take(DOC_CONTEXT_CHARS)
                .collect(),
        });
        resolved_ids.push(transcript.video_id);
    }

    let context = serde_json::to_string_pretty(&entries)?;
    let prompt = DOCUMENT_PROMPT
        .replace("{request}", request)
        .replace("{context}", &context);

    let content = oracle.answer(&prompt).await?;
    let title = extract_title(&content);

    let document = GeneratedDocument {
        id: Uuid::new_v4(),
        title,
        content,
        source_video_ids: resolved_ids,
        created_at: Utc::now(),
    };
    store.insert_document(&document)?;

    info!(
        "Generated document '{}' from {} transcripts",
        document.title,
        transcripts.len()
    );
    Ok(document)
}
