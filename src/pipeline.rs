//! The ingestion pipeline: process, transcribe, chunk, index.
//!
//! Each stage transitions the video into its status, does its work and
//! commits before the next stage starts, so a crash leaves the archive
//! consistent with the recorded status. Any failure parks the video in
//! `error` with the message preserved.

use crate::chunking::{ChunkingConfig, SemanticChunker, SourceSegment};
use crate::embedding::Embedder;
use crate::error::{MinneError, Result};
use crate::lifecycle::VideoStatus;
use crate::media::MediaProcessor;
use crate::model::Video;
use crate::search::{IndexedSegment, SearchIndex};
use crate::store::VideoStore;
use crate::transcription::{normalize_segments, Transcriber};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Drives a video from `uploaded` to `ready`.
pub struct Pipeline {
    store: Arc<VideoStore>,
    media: Arc<dyn MediaProcessor>,
    transcriber: Arc<dyn Transcriber>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SearchIndex>,
    chunking: ChunkingConfig,
    storage_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        store: Arc<VideoStore>,
        media: Arc<dyn MediaProcessor>,
        transcriber: Arc<dyn Transcriber>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn SearchIndex>,
        chunking: ChunkingConfig,
        storage_dir: &Path,
    ) -> Self {
        Self {
            store,
            media,
            transcriber,
            embedder,
            index,
            chunking,
            storage_dir: storage_dir.to_path_buf(),
        }
    }

    /// Run the full pipeline for one video.
    #[instrument(skip(self))]
    pub async fn run(&self, video_id: Uuid) -> Result<Video> {
        if let Err(e) = self.process(video_id).await {
            return Err(self.fail(video_id, "process", e));
        }
        if let Err(e) = self.transcribe(video_id).await {
            return Err(self.fail(video_id, "transcribe", e));
        }
        if let Err(e) = self.chunk(video_id).await {
            return Err(self.fail(video_id, "chunk", e));
        }
        if let Err(e) = self.index_segments(video_id).await {
            return Err(self.fail(video_id, "index", e));
        }

        let video = self.store.get_video(video_id)?;
        info!("Video {} is ready", video_id);
        Ok(video)
    }

    /// Park the video in `error` and wrap the cause as a stage failure.
    ///
    /// A failing error-status update is logged but never masks the
    /// original failure.
    fn fail(&self, video_id: Uuid, stage: &str, err: MinneError) -> MinneError {
        let message = err.to_string();
        error!("Stage '{}' failed for video {}: {}", stage, video_id, message);
        if let Err(update_err) =
            self.store
                .transition_status(video_id, VideoStatus::Error, Some(message.as_str()))
        {
            error!(
                "Failed to record error status for video {}: {}",
                video_id, update_err
            );
        }
        MinneError::Stage {
            stage: stage.to_string(),
            message,
        }
    }

    fn audio_path(&self, video_id: Uuid) -> PathBuf {
        self.storage_dir
            .join("audio")
            .join(format!("{}.wav", video_id))
    }

    /// Remux to MP4, grab a thumbnail, extract audio.
    async fn process(&self, video_id: Uuid) -> Result<()> {
        self.store
            .transition_status(video_id, VideoStatus::Processing, None)?;
        let video = self.store.get_video(video_id)?;

        let outputs = self
            .media
            .process(
                Path::new(&video.file_path),
                &self.storage_dir,
                &video_id.to_string(),
            )
            .await?;

        self.store.set_media_outputs(
            video_id,
            &outputs.processed_path.to_string_lossy(),
            &outputs.thumbnail_path.to_string_lossy(),
            outputs.duration,
        )?;
        Ok(())
    }

    /// Transcribe the extracted audio and persist the transcript.
    async fn transcribe(&self, video_id: Uuid) -> Result<()> {
        self.store
            .transition_status(video_id, VideoStatus::Transcribing, None)?;

        let audio_path = self.audio_path(video_id);
        if !audio_path.exists() {
            return Err(MinneError::Transcription(format!(
                "Audio file not found: {}",
                audio_path.display()
            )));
        }

        let raw = self.transcriber.transcribe(&audio_path).await?;
        let segments = normalize_segments(&raw.segments);
        if segments.is_empty() {
            return Err(MinneError::Transcription(
                "Transcription produced no segments".to_string(),
            ));
        }

        let language = raw.language.as_deref().unwrap_or("en");
        self.store.insert_transcript(video_id, language, &segments)?;

        // The WAV served its purpose.
        if let Err(e) = tokio::fs::remove_file(&audio_path).await {
            warn!("Failed to clean up {}: {}", audio_path.display(), e);
        }
        Ok(())
    }

    /// Regroup utterance segments into semantic chunks.
    async fn chunk(&self, video_id: Uuid) -> Result<()> {
        self.store
            .transition_status(video_id, VideoStatus::Chunking, None)?;

        let segments = self.store.segments_for_video(video_id)?;
        if segments.is_empty() {
            return Err(MinneError::NotFound(format!(
                "No segments for video {}",
                video_id
            )));
        }

        let source: Vec<SourceSegment> = segments
            .into_iter()
            .map(|s| SourceSegment {
                text: s.text,
                start_time: s.start_time,
                end_time: s.end_time,
                speaker: s.speaker,
            })
            .collect();

        let chunker = SemanticChunker::new(self.embedder.clone(), self.chunking.clone());
        let chunks = chunker.chunk(&source).await?;

        self.store.replace_segments(video_id, &chunks)?;
        Ok(())
    }

    /// Embed the final chunks and push them into the search index.
    async fn index_segments(&self, video_id: Uuid) -> Result<()> {
        self.store
            .transition_status(video_id, VideoStatus::Indexing, None)?;

        let video = self.store.get_video(video_id)?;
        let segments = self.store.segments_for_video(video_id)?;
        if segments.is_empty() {
            return Err(MinneError::NotFound(format!(
                "No segments for video {}",
                video_id
            )));
        }

        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let documents: Vec<IndexedSegment> = segments
            .iter()
            .zip(embeddings)
            .map(|(seg, embedding)| IndexedSegment {
                id: seg.id,
                video_id,
                video_title: video.title.clone(),
                transcript_id: seg.transcript_id,
                text: seg.text.clone(),
                embedding,
                start_time: seg.start_time,
                end_time: seg.end_time,
                speaker: seg.speaker.clone(),
                recording_date: video.recording_date,
                created_at: Utc::now(),
            })
            .collect();

        let indexed = self.index.bulk_upsert(&documents).await?;
        self.store.mark_segments_indexed(video_id)?;
        self.store
            .transition_status(video_id, VideoStatus::Ready, None)?;

        info!("Indexed {} chunks for video {}", indexed, video_id);
        Ok(())
    }
}
