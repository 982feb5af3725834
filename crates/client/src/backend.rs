//! The seam between orchestration and the backend.
//!
//! Workflows and the poller only ever talk to a [`JobBackend`].
//! [`HumanizeApi`](crate::api::HumanizeApi) is the HTTP implementation;
//! tests substitute scripted in-memory backends.

use async_trait::async_trait;
use humanize_core::request::JobRequest;
use humanize_core::status::JobStatusRecord;
use humanize_core::types::JobId;

use crate::api::ApiError;
use crate::error::SubmissionError;

#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Turn an uploaded file into plain text.
    async fn extract_text(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError>;

    /// Queue a transformation job. No retry is performed.
    async fn submit(&self, request: &JobRequest) -> Result<JobId, SubmissionError>;

    /// Fetch one status snapshot of a job.
    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusRecord, ApiError>;
}
