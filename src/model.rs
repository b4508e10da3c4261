//! Persisted data models for the video archive.

use crate::lifecycle::VideoStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A video record, owned exclusively by the pipeline.
///
/// `status` is mutated only through the lifecycle state machine
/// ([`crate::store::VideoStore::transition_status`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    /// Path of the original upload.
    pub file_path: String,
    /// Path of the remuxed/transcoded MP4, set by the process stage.
    pub processed_path: Option<String>,
    pub thumbnail_path: Option<String>,
    /// Duration in whole seconds, set by the process stage.
    pub duration: Option<i64>,
    pub recording_date: Option<NaiveDate>,
    pub participants: Vec<String>,
    pub context_notes: Option<String>,
    pub status: VideoStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to register a new video.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub file_path: String,
    pub recording_date: Option<NaiveDate>,
    pub participants: Vec<String>,
    pub context_notes: Option<String>,
}

/// A transcript, one per video. Created once by the transcription stage
/// and immutable thereafter (superseded, not edited, on re-runs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub video_id: Uuid,
    pub full_text: String,
    pub language: String,
    pub word_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A transcript segment: initially one row per transcribed utterance,
/// replaced wholesale by the chunking stage with coarser semantic chunks.
///
/// Invariant: `start_time < end_time`; segments for a video are ordered by
/// `start_time` with no contiguity guarantee after chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub transcript_id: Uuid,
    pub video_id: Uuid,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub speaker: Option<String>,
    pub chunking_method: String,
    pub embedding_indexed: bool,
    pub created_at: DateTime<Utc>,
}

/// A generated summary document, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub id: Uuid,
    pub title: String,
    /// Markdown content, possibly containing inline `[Title @ MM:SS]` markers.
    pub content: String,
    pub source_video_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}
