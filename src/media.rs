//! Media processing via ffmpeg and ffprobe.
//!
//! Turns an ingested MKV into a streamable MP4, a thumbnail and a
//! transcription-ready WAV.

use crate::error::{MinneError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Artifacts produced by processing one video.
#[derive(Debug, Clone)]
pub struct MediaOutputs {
    pub processed_path: PathBuf,
    pub thumbnail_path: PathBuf,
    pub audio_path: PathBuf,
    /// Duration of the processed video in whole seconds.
    pub duration: i64,
}

/// Trait for media processing backends.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Produce MP4, thumbnail and audio artifacts under `output_dir`.
    ///
    /// Artifacts are named `<stem>.mp4`, `<stem>.jpg` and `<stem>.wav`
    /// under `processed/`, `thumbnails/` and `audio/` subdirectories.
    async fn process(&self, input: &Path, output_dir: &Path, stem: &str) -> Result<MediaOutputs>;
}

/// ffmpeg-based media processor.
pub struct FfmpegProcessor;

#[derive(Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: String,
}

impl FfmpegProcessor {
    pub fn new() -> Self {
        Self
    }

    async fn run_tool(&self, program: &str, args: &[&str]) -> Result<std::process::Output> {
        debug!("Running {} {}", program, args.join(" "));
        Command::new(program).args(args).output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MinneError::ToolNotFound(program.to_string())
            } else {
                MinneError::Media(format!("Failed to run {}: {}", program, e))
            }
        })
    }

    /// Video duration in seconds via ffprobe.
    pub async fn duration(&self, input: &Path) -> Result<f64> {
        let input_str = path_str(input)?;
        let output = self
            .run_tool(
                "ffprobe",
                &["-v", "quiet", "-print_format", "json", "-show_format", input_str],
            )
            .await?;

        if !output.status.success() {
            return Err(MinneError::ToolFailed(format!(
                "ffprobe failed for {}: {}",
                input.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| MinneError::Media(format!("Invalid ffprobe output: {}", e)))?;
        probe
            .format
            .duration
            .parse::<f64>()
            .map_err(|e| MinneError::Media(format!("Invalid duration from ffprobe: {}", e)))
    }

    /// Remux to MP4, falling back to a full transcode when the source
    /// streams cannot be copied into an MP4 container.
    #[instrument(skip(self), fields(input = %input.display()))]
    async fn remux_to_mp4(&self, input: &Path, output: &Path) -> Result<()> {
        let input_str = path_str(input)?;
        let output_str = path_str(output)?;

        let copy = self
            .run_tool(
                "ffmpeg",
                &[
                    "-y",
                    "-i",
                    input_str,
                    "-c",
                    "copy",
                    "-movflags",
                    "+faststart",
                    output_str,
                ],
            )
            .await?;
        if copy.status.success() {
            info!("Remuxed {} to MP4 (stream copy)", input.display());
            return Ok(());
        }

        info!("Stream copy failed, transcoding {}", input.display());
        let transcode = self
            .run_tool(
                "ffmpeg",
                &[
                    "-y",
                    "-i",
                    input_str,
                    "-c:v",
                    "libx264",
                    "-preset",
                    "medium",
                    "-crf",
                    "23",
                    "-c:a",
                    "aac",
                    "-b:a",
                    "128k",
                    "-movflags",
                    "+faststart",
                    output_str,
                ],
            )
            .await?;
        if !transcode.status.success() {
            return Err(MinneError::ToolFailed(format!(
                "ffmpeg transcode failed: {}",
                truncate_stderr(&transcode.stderr)
            )));
        }
        info!("Transcoded {} to MP4", input.display());
        Ok(())
    }

    /// Grab one letterboxed 320x180 frame at 10% of the duration.
    async fn generate_thumbnail(&self, input: &Path, output: &Path) -> Result<()> {
        let duration = self.duration(input).await?;
        let timestamp = format!("{}", duration * 0.1);

        let result = self
            .run_tool(
                "ffmpeg",
                &[
                    "-y",
                    "-ss",
                    &timestamp,
                    "-i",
                    path_str(input)?,
                    "-vframes",
                    "1",
                    "-vf",
                    "scale=320:180:force_original_aspect_ratio=decrease,\
                     pad=320:180:(ow-iw)/2:(oh-ih)/2",
                    path_str(output)?,
                ],
            )
            .await?;
        if !result.status.success() {
            return Err(MinneError::ToolFailed(format!(
                "Thumbnail generation failed: {}",
                truncate_stderr(&result.stderr)
            )));
        }
        debug!("Generated thumbnail at {}s", timestamp);
        Ok(())
    }

    /// Extract 16kHz mono WAV, the input format the transcriber expects.
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<()> {
        let result = self
            .run_tool(
                "ffmpeg",
                &[
                    "-y",
                    "-i",
                    path_str(input)?,
                    "-vn",
                    "-acodec",
                    "pcm_s16le",
                    "-ar",
                    "16000",
                    "-ac",
                    "1",
                    path_str(output)?,
                ],
            )
            .await?;
        if !result.status.success() {
            return Err(MinneError::ToolFailed(format!(
                "Audio extraction failed: {}",
                truncate_stderr(&result.stderr)
            )));
        }
        Ok(())
    }
}

impl Default for FfmpegProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    #[instrument(skip(self), fields(input = %input.display()))]
    async fn process(&self, input: &Path, output_dir: &Path, stem: &str) -> Result<MediaOutputs> {
        let processed_path = output_dir.join("processed").join(format!("{}.mp4", stem));
        let thumbnail_path = output_dir.join("thumbnails").join(format!("{}.jpg", stem));
        let audio_path = output_dir.join("audio").join(format!("{}.wav", stem));

        for path in [&processed_path, &thumbnail_path, &audio_path] {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        self.remux_to_mp4(input, &processed_path).await?;
        // Thumbnail and audio come from the MP4, not the original.
        self.generate_thumbnail(&processed_path, &thumbnail_path)
            .await?;
        self.extract_audio(&processed_path, &audio_path).await?;

        let duration = self.duration(&processed_path).await? as i64;
        info!(
            "Processed {} (duration={}s)",
            input.display(),
            duration
        );

        Ok(MediaOutputs {
            processed_path,
            thumbnail_path,
            audio_path,
            duration,
        })
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| MinneError::Media(format!("Non-UTF8 path: {}", path.display())))
}

fn truncate_stderr(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() > 500 {
        trimmed.chars().take(500).collect()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_output_parses() {
        let json = r#"{"format": {"filename": "a.mp4", "duration": "431.520000"}}"#;
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(probe.format.duration, "431.520000");
        assert!((probe.format.duration.parse::<f64>().unwrap() - 431.52).abs() < 1e-9);
    }

    #[test]
    fn test_truncate_stderr_caps_length() {
        let long = vec![b'x'; 2000];
        assert_eq!(truncate_stderr(&long).len(), 500);
        assert_eq!(truncate_stderr(b"  short  "), "short");
    }
}
