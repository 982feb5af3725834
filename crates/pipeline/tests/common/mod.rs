//! Configurable in-memory backend for workflow tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use humanize_client::{ApiError, JobBackend, SubmissionError};
use humanize_core::request::JobRequest;
use humanize_core::status::{JobState, JobStatusRecord};
use humanize_core::types::JobId;
use parking_lot::Mutex;

/// Jobs are numbered `job-1`, `job-2`, ... in submission order. Each job
/// reports `processing` for `processing_rounds` queries, then completes with
/// `humanized: <submitted text>` unless told to fail.
pub struct FakeBackend {
    processing_rounds: usize,
    submissions: AtomicUsize,
    failing_submissions: HashSet<usize>,
    failing_jobs: HashMap<String, String>,
    failing_uploads: HashSet<String>,
    texts: Mutex<HashMap<JobId, String>>,
    status_calls: Mutex<HashMap<JobId, usize>>,
    forget_outputs: bool,
    upload_delay: Duration,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            processing_rounds: 1,
            submissions: AtomicUsize::new(0),
            failing_submissions: HashSet::new(),
            failing_jobs: HashMap::new(),
            failing_uploads: HashSet::new(),
            texts: Mutex::new(HashMap::new()),
            status_calls: Mutex::new(HashMap::new()),
            forget_outputs: false,
            upload_delay: Duration::ZERO,
        }
    }

    pub fn processing_rounds(mut self, rounds: usize) -> Self {
        self.processing_rounds = rounds;
        self
    }

    /// Jobs never leave `processing`.
    pub fn never_finish(self) -> Self {
        self.processing_rounds(usize::MAX)
    }

    /// Reject the `n`-th submission (1-based) with HTTP 402.
    pub fn fail_submission(mut self, n: usize) -> Self {
        self.failing_submissions.insert(n);
        self
    }

    /// Report `job_id` as failed with `message`.
    pub fn fail_job(mut self, job_id: &str, message: &str) -> Self {
        self.failing_jobs
            .insert(job_id.to_string(), message.to_string());
        self
    }

    pub fn fail_upload(mut self, file_name: &str) -> Self {
        self.failing_uploads.insert(file_name.to_string());
        self
    }

    /// Text extraction takes `delay`.
    pub fn slow_upload(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    /// Completed records carry no `output_text`.
    pub fn forget_outputs(mut self) -> Self {
        self.forget_outputs = true;
        self
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self, job_id: &str) -> usize {
        self.status_calls
            .lock()
            .get(&JobId::new(job_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_status_calls(&self) -> usize {
        self.status_calls.lock().values().sum()
    }

    pub fn submitted_text(&self, job_id: &str) -> Option<String> {
        self.texts.lock().get(&JobId::new(job_id)).cloned()
    }
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn extract_text(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }
        if self.failing_uploads.contains(file_name) {
            return Err(ApiError::Api {
                status: 400,
                detail: "Unsupported file type".to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn submit(&self, request: &JobRequest) -> Result<JobId, SubmissionError> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_submissions.contains(&n) {
            return Err(SubmissionError::InsufficientCredits {
                message: "Insufficient credits".to_string(),
            });
        }
        let job_id = JobId::new(format!("job-{n}"));
        self.texts
            .lock()
            .insert(job_id.clone(), request.text().to_string());
        Ok(job_id)
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusRecord, ApiError> {
        let calls = {
            let mut counts = self.status_calls.lock();
            let count = counts.entry(job_id.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let Some(text) = self.texts.lock().get(job_id).cloned() else {
            return Err(ApiError::Api {
                status: 404,
                detail: "Job not found".to_string(),
            });
        };

        if calls <= self.processing_rounds {
            return Ok(JobStatusRecord::with_state(JobState::Processing));
        }
        if let Some(message) = self.failing_jobs.get(job_id.as_str()) {
            return Ok(JobStatusRecord {
                error_message: Some(message.clone()),
                ..JobStatusRecord::with_state(JobState::Failed)
            });
        }
        let output_text = if self.forget_outputs && calls == self.processing_rounds + 1 {
            None
        } else {
            Some(format!("humanized: {text}"))
        };
        Ok(JobStatusRecord {
            output_text,
            ..JobStatusRecord::with_state(JobState::Completed)
        })
    }
}
