//! Video lifecycle state machine.
//!
//! Every video moves through the pipeline as a sequence of statuses:
//! uploaded -> processing -> transcribing -> chunking -> indexing -> ready.
//! The `error` status is reachable from every non-terminal state and is
//! terminal; a failed video is reprocessed as a new pipeline run rather
//! than resumed. Validation is pure; persistence lives in [`crate::store`].

use crate::error::{MinneError, Result};
use serde::{Deserialize, Serialize};

/// Processing status of a video in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Uploaded,
    Processing,
    Transcribing,
    Chunking,
    Indexing,
    Ready,
    Error,
}

impl VideoStatus {
    /// All statuses, in pipeline order.
    pub const ALL: [VideoStatus; 7] = [
        VideoStatus::Uploaded,
        VideoStatus::Processing,
        VideoStatus::Transcribing,
        VideoStatus::Chunking,
        VideoStatus::Indexing,
        VideoStatus::Ready,
        VideoStatus::Error,
    ];

    /// Whether no further transitions are possible from this status.
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

impl std::str::FromStr for VideoStatus {
    type Err = MinneError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uploaded" => Ok(VideoStatus::Uploaded),
            "processing" => Ok(VideoStatus::Processing),
            "transcribing" => Ok(VideoStatus::Transcribing),
            "chunking" => Ok(VideoStatus::Chunking),
            "indexing" => Ok(VideoStatus::Indexing),
            "ready" => Ok(VideoStatus::Ready),
            "error" => Ok(VideoStatus::Error),
            _ => Err(MinneError::InvalidInput(format!(
                "Unknown video status: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VideoStatus::Uploaded => "uploaded",
            VideoStatus::Processing => "processing",
            VideoStatus::Transcribing => "transcribing",
            VideoStatus::Chunking => "chunking",
            VideoStatus::Indexing => "indexing",
            VideoStatus::Ready => "ready",
            VideoStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// The legal next statuses for a given current status.
///
/// `error` is reachable from every non-terminal state and has no way out.
pub fn allowed_transitions(status: VideoStatus) -> &'static [VideoStatus] {
    match status {
        VideoStatus::Uploaded => &[VideoStatus::Processing, VideoStatus::Error],
        VideoStatus::Processing => &[VideoStatus::Transcribing, VideoStatus::Error],
        VideoStatus::Transcribing => &[VideoStatus::Chunking, VideoStatus::Error],
        VideoStatus::Chunking => &[VideoStatus::Indexing, VideoStatus::Error],
        VideoStatus::Indexing => &[VideoStatus::Ready, VideoStatus::Error],
        VideoStatus::Ready => &[VideoStatus::Error],
        VideoStatus::Error => &[],
    }
}

/// Validate a status transition without persisting anything.
///
/// Must run before any write; callers rely on this to reject illegal
/// transitions as caller errors that are never retried.
pub fn validate_transition(current: VideoStatus, target: VideoStatus) -> Result<()> {
    if allowed_transitions(current).contains(&target) {
        Ok(())
    } else {
        Err(MinneError::InvalidTransition {
            from: current,
            to: target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_pipeline_chain_is_legal() {
        let chain = [
            VideoStatus::Uploaded,
            VideoStatus::Processing,
            VideoStatus::Transcribing,
            VideoStatus::Chunking,
            VideoStatus::Indexing,
            VideoStatus::Ready,
        ];

        for pair in chain.windows(2) {
            validate_transition(pair[0], pair[1]).unwrap();
        }
    }

    #[test]
    fn test_no_backward_transition() {
        let err = validate_transition(VideoStatus::Ready, VideoStatus::Uploaded).unwrap_err();
        assert!(matches!(
            err,
            MinneError::InvalidTransition {
                from: VideoStatus::Ready,
                to: VideoStatus::Uploaded,
            }
        ));
    }

    #[test]
    fn test_error_is_reachable_from_every_non_terminal_state() {
        for status in VideoStatus::ALL {
            if status == VideoStatus::Error {
                continue;
            }
            validate_transition(status, VideoStatus::Error).unwrap();
        }
    }

    #[test]
    fn test_error_is_terminal() {
        assert!(VideoStatus::Error.is_terminal());
        for target in VideoStatus::ALL {
            assert!(validate_transition(VideoStatus::Error, target).is_err());
        }
    }

    #[test]
    fn test_no_stage_skipping() {
        assert!(validate_transition(VideoStatus::Uploaded, VideoStatus::Transcribing).is_err());
        assert!(validate_transition(VideoStatus::Processing, VideoStatus::Ready).is_err());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in VideoStatus::ALL {
            let parsed: VideoStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }
}
