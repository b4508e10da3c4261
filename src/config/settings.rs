//! Configuration settings for Minne.

use crate::chunking::ChunkingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub storage: StorageSettings,
    pub transcription: TranscriptionSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub answer: AnswerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.minne".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Storage locations for media artifacts and the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory for original, processed and derived video artifacts.
    pub video_dir: String,
    /// Path to the SQLite database.
    pub database_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            video_dir: "~/.minne/videos".to_string(),
            database_path: "~/.minne/minne.db".to_string(),
        }
    }
}

/// Transcription settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// WhisperX model size.
    pub model: String,
    /// Compute device (cpu, cuda).
    pub device: String,
    /// HuggingFace token enabling speaker diarization.
    pub hf_token: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "medium".to_string(),
            device: "cpu".to_string(),
            hf_token: None,
        }
    }
}

/// Semantic chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Cosine similarity threshold for chunk boundaries.
    pub similarity_threshold: f32,
    /// Minimum words per chunk.
    pub min_chunk_tokens: usize,
    /// Maximum words per chunk.
    pub max_chunk_tokens: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        let config = ChunkingConfig::default();
        Self {
            similarity_threshold: config.similarity_threshold,
            min_chunk_tokens: config.min_chunk_tokens,
            max_chunk_tokens: config.max_chunk_tokens,
        }
    }
}

impl ChunkingSettings {
    pub fn to_config(&self) -> ChunkingConfig {
        ChunkingConfig {
            similarity_threshold: self.similarity_threshold,
            min_chunk_tokens: self.min_chunk_tokens,
            max_chunk_tokens: self.max_chunk_tokens,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 768,
        }
    }
}

/// Search backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Search backend (opensearch, memory).
    pub backend: String,
    /// OpenSearch endpoint.
    pub endpoint: String,
    /// Index name for transcript chunks.
    pub index: String,
    /// Default result limit.
    pub limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            backend: "opensearch".to_string(),
            endpoint: "http://localhost:9200".to_string(),
            index: "minne-segments".to_string(),
            limit: 10,
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    /// LLM CLI command used for answers and documents.
    pub command: String,
    /// Arguments passed before the prompt.
    pub args: Vec<String>,
    /// Timeout for one model invocation.
    pub timeout_secs: u64,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            command: "llm".to_string(),
            args: Vec::new(),
            timeout_secs: 120,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::MinneError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("minne")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded video storage directory.
    pub fn video_dir(&self) -> PathBuf {
        Self::expand_path(&self.storage.video_dir)
    }

    /// Get the expanded database path.
    pub fn database_path(&self) -> PathBuf {
        Self::expand_path(&self.storage.database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sensible() {
        let settings = Settings::default();
        assert_eq!(settings.search.limit, 10);
        assert_eq!(settings.embedding.dimensions, 768);
        assert_eq!(settings.chunking.max_chunk_tokens, 500);
        assert_eq!(settings.answer.timeout_secs, 120);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str(
            "[transcription]\nmodel = \"large-v2\"\ndevice = \"cuda\"\n\n\
             [search]\nlimit = 5\n",
        )
        .unwrap();

        assert_eq!(settings.transcription.model, "large-v2");
        assert_eq!(settings.search.limit, 5);
        // Untouched sections keep their defaults.
        assert_eq!(settings.search.backend, "opensearch");
        assert_eq!(settings.chunking.similarity_threshold, 0.5);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let settings = Settings::default();
        let serialized = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.general.data_dir, settings.general.data_dir);
        assert_eq!(parsed.answer.command, settings.answer.command);
    }
}
