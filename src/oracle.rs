//! Answer generation via an external language model CLI.
//!
//! All answer and document generation goes through this one seam, so the
//! model command is swappable in configuration and mockable in tests.

use crate::error::{MinneError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Trait for answer generation backends.
#[async_trait]
pub trait AnswerOracle: Send + Sync {
    /// Send a prompt and return the model's text response.
    async fn answer(&self, prompt: &str) -> Result<String>;
}

/// Oracle backed by a local LLM command-line tool.
///
/// The prompt is passed as the final argument after any configured base
/// arguments; the response is read from stdout.
pub struct CliOracle {
    program: String,
    base_args: Vec<String>,
    timeout: Duration,
}

impl CliOracle {
    pub fn new(program: &str, base_args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            program: program.to_string(),
            base_args,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl AnswerOracle for CliOracle {
    #[instrument(skip(self, prompt), fields(program = %self.program))]
    async fn answer(&self, prompt: &str) -> Result<String> {
        debug!("Invoking {} with {} char prompt", self.program, prompt.len());

        let child = Command::new(&self.program)
            .args(&self.base_args)
            .arg(prompt)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| MinneError::OracleTimeout(self.timeout.as_secs()))?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MinneError::ToolNotFound(self.program.clone())
                } else {
                    MinneError::Oracle(format!("Failed to run {}: {}", self.program, e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MinneError::Oracle(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_maps_to_tool_not_found() {
        let oracle = CliOracle::new("definitely-not-a-real-binary-7f3a", vec![], 5);
        let err = oracle.answer("hello").await.unwrap_err();
        assert!(matches!(err, MinneError::ToolNotFound(_)));
    }
}
