//! Error taxonomy for submission and polling.
//!
//! Backend-supplied messages are carried verbatim so they can be shown to
//! the user as-is; local failures (timeout, transport) get fixed wording.

use std::time::Duration;

use humanize_core::types::JobId;

use crate::api::ApiError;

/// The backend refused a request, or it never reached the backend. No job
/// handle exists when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The request failed local validation before being sent.
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// The backend rejected the payload (validation or any other non-2xx
    /// status not covered below).
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The account has no credits left (HTTP 402).
    #[error("{message}")]
    InsufficientCredits { message: String },

    /// Missing, expired or insufficient credentials (HTTP 401/403).
    #[error("{message}")]
    Unauthorized { message: String },

    /// The request never got an HTTP answer.
    #[error("Could not reach the processing service")]
    Transport(#[source] reqwest::Error),
}

impl From<ApiError> for SubmissionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Request(e) => Self::Transport(e),
            ApiError::Api { status: 401 | 403, detail } => Self::Unauthorized { message: detail },
            ApiError::Api { status: 402, detail } => Self::InsufficientCredits { message: detail },
            ApiError::Api { status, detail } => Self::Rejected {
                status,
                message: detail,
            },
        }
    }
}

/// Polling ended without observing a terminal job state.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// A status query failed. Not retried.
    #[error("Job status query failed: {0}")]
    Transport(String),

    /// No terminal state was observed within the configured window.
    #[error("Processing timeout: no result within {}s", .timeout.as_secs())]
    Timeout { job_id: JobId, timeout: Duration },

    /// The poll was cancelled before the job settled.
    #[error("Polling cancelled")]
    Cancelled,

    /// A poll for this job is already running on the same poller.
    #[error("Job {0} is already being polled")]
    AlreadyPolling(JobId),
}

impl From<ApiError> for PollError {
    fn from(err: ApiError) -> Self {
        Self::Transport(err.to_string())
    }
}
