//! Command implementations.

use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::MinneError;
use crate::media::FfmpegProcessor;
use crate::model::NewVideo;
use crate::oracle::{AnswerOracle, CliOracle};
use crate::pipeline::Pipeline;
use crate::rag::AnswerEngine;
use crate::search::{hybrid_search, MemoryIndex, OpenSearchIndex, SearchIndex};
use crate::store::VideoStore;
use crate::transcription::WhisperXTranscriber;
use anyhow::Result;
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

fn open_store(settings: &Settings) -> Result<Arc<VideoStore>> {
    Ok(Arc::new(VideoStore::new(&settings.database_path())?))
}

fn build_embedder(settings: &Settings) -> Arc<dyn Embedder> {
    Arc::new(OpenAIEmbedder::with_config(
        &settings.embedding.model,
        settings.embedding.dimensions,
    ))
}

async fn build_index(settings: &Settings) -> Result<Arc<dyn SearchIndex>> {
    match settings.search.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryIndex::new())),
        "opensearch" => {
            let index = OpenSearchIndex::new(
                &settings.search.endpoint,
                &settings.search.index,
                settings.embedding.dimensions,
            )?;
            index.ensure_index().await?;
            Ok(Arc::new(index))
        }
        other => Err(MinneError::Config(format!("Unknown search backend: {}", other)).into()),
    }
}

fn build_oracle(settings: &Settings) -> Arc<dyn AnswerOracle> {
    Arc::new(CliOracle::new(
        &settings.answer.command,
        settings.answer.args.clone(),
        settings.answer.timeout_secs,
    ))
}

fn build_pipeline(
    settings: &Settings,
    store: Arc<VideoStore>,
    index: Arc<dyn SearchIndex>,
) -> Pipeline {
    Pipeline::new(
        store,
        Arc::new(FfmpegProcessor::new()),
        Arc::new(WhisperXTranscriber::new(
            &settings.transcription.model,
            &settings.transcription.device,
            settings.transcription.hf_token.clone(),
        )),
        build_embedder(settings),
        index,
        settings.chunking.to_config(),
        &settings.video_dir(),
    )
}

/// Ingest an MKV file into the archive.
pub async fn run_add(
    file: &Path,
    title: &str,
    date: Option<&str>,
    participants: Vec<String>,
    notes: Option<String>,
    run_pipeline: bool,
    settings: Settings,
) -> Result<()> {
    let is_mkv = file
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mkv"));
    if !is_mkv {
        return Err(MinneError::InvalidInput("Only .mkv files are accepted".to_string()).into());
    }
    if !file.exists() {
        return Err(MinneError::InvalidInput(format!("File not found: {}", file.display())).into());
    }

    let recording_date = date
        .map(|d| {
            NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|e| {
                MinneError::InvalidInput(format!("Invalid date '{}': {}", d, e))
            })
        })
        .transpose()?;

    let store = open_store(&settings)?;
    let video = store.create_video(NewVideo {
        title: title.to_string(),
        file_path: file.to_string_lossy().into_owned(),
        recording_date,
        participants,
        context_notes: notes,
    })?;

    // Take a copy so the archive owns its source material.
    let original_dir = settings.video_dir().join("original");
    std::fs::create_dir_all(&original_dir)?;
    let dest = original_dir.join(format!("{}.mkv", video.id));
    std::fs::copy(file, &dest)?;
    store.set_file_path(video.id, &dest.to_string_lossy())?;

    Output::success(&format!("Ingested '{}' as {}", title, video.id));

    if run_pipeline {
        run_run(video.id, settings).await?;
    } else {
        Output::info(&format!("Process it with: minne run {}", video.id));
    }
    Ok(())
}

/// Run the processing pipeline for a video.
pub async fn run_run(video_id: Uuid, settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let index = build_index(&settings).await?;
    let pipeline = build_pipeline(&settings, store, index);

    Output::info(&format!("Processing video {}", video_id));
    let video = pipeline.run(video_id).await?;
    Output::success(&format!(
        "'{}' is ready (duration {})",
        video.title,
        video
            .duration
            .map(super::output::format_duration)
            .unwrap_or_else(|| "unknown".to_string())
    ));
    Ok(())
}

/// Show one video's status and metadata.
pub fn run_status(video_id: Uuid, settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let video = store.get_video(video_id)?;

    Output::kv("title", &video.title);
    Output::kv("status", &video.status.to_string());
    if let Some(date) = video.recording_date {
        Output::kv("recorded", &date.to_string());
    }
    if let Some(duration) = video.duration {
        Output::kv("duration", &super::output::format_duration(duration));
    }
    if !video.participants.is_empty() {
        Output::kv("participants", &video.participants.join(", "));
    }
    if let Some(path) = &video.processed_path {
        Output::kv("processed", path);
    }
    if let Some(msg) = &video.error_message {
        Output::kv("error", msg);
    }
    Ok(())
}

/// List all videos with their pipeline status.
pub fn run_list(settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let videos = store.list_videos()?;

    if videos.is_empty() {
        Output::info("The archive is empty. Ingest a recording with: minne add");
        return Ok(());
    }

    Output::info(&format!("{} videos in the archive", videos.len()));
    for video in &videos {
        Output::video_line(
            &video.title,
            &video.id.to_string(),
            &video.status.to_string(),
            video.duration,
        );
        if let Some(msg) = &video.error_message {
            Output::kv("error", msg);
        }
    }
    Ok(())
}

/// Search the archive.
pub async fn run_search(query: &str, limit: Option<usize>, settings: Settings) -> Result<()> {
    let index = build_index(&settings).await?;
    let embedder = build_embedder(&settings);
    let limit = limit.unwrap_or(settings.search.limit);

    let results = hybrid_search(index.as_ref(), embedder.as_ref(), query, limit).await?;
    if results.is_empty() {
        Output::warning("No results found matching your query.");
        return Ok(());
    }

    Output::success(&format!("Found {} results", results.len()));
    for result in &results {
        Output::search_result(
            &result.video_title,
            &result.timestamp_formatted,
            result.score,
            &result.text,
        );
    }
    Ok(())
}

/// Ask a question and print the cited answer.
pub async fn run_ask(question: &str, settings: Settings) -> Result<()> {
    let index = build_index(&settings).await?;
    let embedder = build_embedder(&settings);
    let oracle = build_oracle(&settings);
    let engine = AnswerEngine::new(index, embedder, oracle, settings.search.limit);

    let answer = engine.ask(question).await?;
    println!("{}", answer.message);

    if !answer.citations.is_empty() {
        println!();
        Output::info("Sources:");
        for citation in &answer.citations {
            Output::citation(
                &citation.video_title,
                &crate::search::format_timestamp(citation.timestamp),
                &citation.text,
            );
        }
    }
    Ok(())
}

/// Generate a summary document.
pub async fn run_doc(request: &str, videos: Vec<Uuid>, settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let oracle = build_oracle(&settings);

    let document = crate::document::generate_document(&store, oracle, request, &videos).await?;
    Output::success(&format!("Generated '{}' ({})", document.title, document.id));
    println!("\n{}", document.content);
    Ok(())
}

/// Show configuration or its path.
pub fn run_config(action: &super::ConfigAction, settings: Settings) -> Result<()> {
    match action {
        super::ConfigAction::Show => {
            let content = toml::to_string_pretty(&settings)
                .map_err(|e| MinneError::Config(e.to_string()))?;
            print!("{}", content);
        }
        super::ConfigAction::Path => {
            println!("{}", Settings::default_config_path().display());
        }
    }
    Ok(())
}
