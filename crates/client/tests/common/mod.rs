//! Scripted in-memory backend shared by the client integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use humanize_client::{ApiError, JobBackend, SubmissionError};
use humanize_core::request::JobRequest;
use humanize_core::status::{JobState, JobStatusRecord};
use humanize_core::types::JobId;
use parking_lot::Mutex;

/// Answers status queries from a fixed script; once the script is exhausted
/// every further query reports `processing`.
pub struct ScriptedBackend {
    statuses: Mutex<VecDeque<Result<JobStatusRecord, ApiError>>>,
    status_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<JobStatusRecord, ApiError>>) -> Self {
        Self {
            statuses: Mutex::new(script.into()),
            status_calls: AtomicUsize::new(0),
        }
    }

    /// `n` processing snapshots followed by `last`.
    pub fn processing_then(n: usize, last: JobStatusRecord) -> Self {
        let mut script: Vec<_> = (0..n).map(|_| Ok(state(JobState::Processing))).collect();
        script.push(Ok(last));
        Self::new(script)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobBackend for ScriptedBackend {
    async fn extract_text(&self, _file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn submit(&self, _request: &JobRequest) -> Result<JobId, SubmissionError> {
        Ok(JobId::new("job-1"))
    }

    async fn job_status(&self, _job_id: &JobId) -> Result<JobStatusRecord, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(state(JobState::Processing)))
    }
}

/// Status queries never return.
#[derive(Default)]
pub struct HangingBackend {
    pub status_calls: AtomicUsize,
}

#[async_trait]
impl JobBackend for HangingBackend {
    async fn extract_text(&self, _file_name: &str, _bytes: Vec<u8>) -> Result<String, ApiError> {
        std::future::pending().await
    }

    async fn submit(&self, _request: &JobRequest) -> Result<JobId, SubmissionError> {
        Ok(JobId::new("job-hang"))
    }

    async fn job_status(&self, _job_id: &JobId) -> Result<JobStatusRecord, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

pub fn state(status: JobState) -> JobStatusRecord {
    JobStatusRecord::with_state(status)
}

pub fn completed(output: &str) -> JobStatusRecord {
    JobStatusRecord {
        output_text: Some(output.to_string()),
        ..state(JobState::Completed)
    }
}

pub fn failed(message: &str) -> JobStatusRecord {
    JobStatusRecord {
        error_message: Some(message.to_string()),
        ..state(JobState::Failed)
    }
}
