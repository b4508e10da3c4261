//! Error types for Minne.

use crate::lifecycle::VideoStatus;
use thiserror::Error;

/// Library-level error type for Minne operations.
#[derive(Error, Debug)]
pub enum MinneError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: VideoStatus, to: VideoStatus },

    #[error("Stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Media processing failed: {0}")]
    Media(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Search index error: {0}")]
    SearchIndex(String),

    #[error("Answer oracle error: {0}")]
    Oracle(String),

    #[error("Answer oracle timed out after {0}s")]
    OracleTimeout(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Minne operations.
pub type Result<T> = std::result::Result<T, MinneError>;
