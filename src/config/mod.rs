//! Configuration module for Minne.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    AnswerSettings, ChunkingSettings, EmbeddingSettings, GeneralSettings, SearchSettings,
    Settings, StorageSettings, TranscriptionSettings,
};
