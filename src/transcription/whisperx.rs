//! WhisperX CLI transcription backend.
//!
//! Runs the `whisperx` command-line tool, which transcribes, aligns and
//! (with a HuggingFace token) diarizes in one pass, writing a JSON file
//! next to its output directory.

use super::{RawTranscription, Transcriber};
use crate::error::{MinneError, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// WhisperX subprocess transcriber.
pub struct WhisperXTranscriber {
    model: String,
    device: String,
    hf_token: Option<String>,
}

impl WhisperXTranscriber {
    pub fn new(model: &str, device: &str, hf_token: Option<String>) -> Self {
        Self {
            model: model.to_string(),
            device: device.to_string(),
            hf_token,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperXTranscriber {
    #[instrument(skip(self), fields(audio_path = %audio_path.display(), model = %self.model))]
    async fn transcribe(&self, audio_path: &Path) -> Result<RawTranscription> {
        let output_dir = tempfile_dir()?;

        let mut cmd = Command::new("whisperx");
        cmd.arg(audio_path)
            .args(["--model", &self.model])
            .args(["--device", &self.device])
            .args(["--compute_type", "int8"])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(output_dir.path());

        if let Some(token) = &self.hf_token {
            cmd.arg("--diarize").args(["--hf_token", token]);
        } else {
            debug!("No HuggingFace token, skipping diarization");
        }

        info!("Running whisperx on {}", audio_path.display());
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MinneError::ToolNotFound("whisperx".to_string())
            } else {
                MinneError::Transcription(format!("Failed to run whisperx: {}", e))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MinneError::ToolFailed(format!(
                "whisperx exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        // whisperx names its output after the input file's stem.
        let stem = audio_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                MinneError::Transcription(format!(
                    "Audio path has no file stem: {}",
                    audio_path.display()
                ))
            })?;
        let json_path = output_dir.path().join(format!("{}.json", stem));

        let raw = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            MinneError::Transcription(format!(
                "Missing whisperx output {}: {}",
                json_path.display(),
                e
            ))
        })?;
        let transcription: RawTranscription = serde_json::from_str(&raw)
            .map_err(|e| MinneError::Transcription(format!("Invalid whisperx output: {}", e)))?;

        if transcription.segments.is_empty() {
            warn!("whisperx produced no segments for {}", audio_path.display());
        } else {
            info!("Transcribed {} raw segments", transcription.segments.len());
        }

        Ok(transcription)
    }
}

fn tempfile_dir() -> Result<tempfile::TempDir> {
    tempfile::tempdir().map_err(MinneError::Io)
}

#[cfg(test)]
mod tests {
    use super::super::normalize_segments;
    use super::*;

    #[test]
    fn test_whisperx_json_parses() {
        let json = r#"{
            "segments": [
                {"start": 0.5, "end": 4.2, "text": " Hello everyone. ", "speaker": "SPEAKER_01"},
                {"start": 4.2, "end": 6.0, "text": "Welcome back."}
            ],
            "language": "en"
        }"#;

        let parsed: RawTranscription = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.language.as_deref(), Some("en"));

        let normalized = normalize_segments(&parsed.segments);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].text, "Hello everyone.");
        assert_eq!(normalized[0].speaker, "SPEAKER_01");
    }
}
