//! The single error type surfaced by workflow runs.
//!
//! `Display` is the message shown to the user; the lower-level cause is kept
//! behind `source()` for logs.

use humanize_client::{ApiError, PollError, SubmissionError};
use humanize_core::error::CoreError;
use humanize_core::types::JobId;

#[derive(Debug, thiserror::Error)]
pub enum HumanizeError {
    /// Rejected locally before anything was sent.
    #[error("{0}")]
    Invalid(#[from] CoreError),

    /// A source file could not be read from disk.
    #[error("Could not read {name}")]
    ReadFile {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Text extraction of an uploaded file failed.
    #[error("File upload failed: {0}")]
    Upload(#[source] ApiError),

    /// The backend refused the job; its message is shown verbatim.
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// Polling ended without a terminal state.
    #[error("{}", poll_message(.0))]
    Poll(#[source] PollError),

    /// The backend reported the job as failed.
    #[error("{message}")]
    JobFailed { job_id: JobId, message: String },

    /// A shared batch deadline passed before this item could start.
    #[error("Processing timeout")]
    DeadlineExceeded,
}

/// Failures reading or writing local result files.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed history file {}: {source}", .path.display())]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not encode history: {0}")]
    Encode(#[from] serde_json::Error),
}

fn poll_message(err: &PollError) -> String {
    match err {
        PollError::Timeout { .. } => "Processing timeout".to_string(),
        PollError::Cancelled => "Processing cancelled".to_string(),
        PollError::Transport(msg) => format!("Could not check job status: {msg}"),
        PollError::AlreadyPolling(id) => format!("Job {id} is already being processed"),
    }
}

impl From<PollError> for HumanizeError {
    fn from(err: PollError) -> Self {
        Self::Poll(err)
    }
}

impl HumanizeError {
    /// Whether the run ended because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Poll(PollError::Cancelled))
    }

    /// Whether the run ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Poll(PollError::Timeout { .. }) | Self::DeadlineExceeded
        )
    }
}
