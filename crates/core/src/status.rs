//! Job status projections returned by `GET /api/job/{id}`.
//!
//! The client never writes these; it only reads them and reacts to state
//! transitions. [`JobStatusRecord::outcome`] collapses a terminal record into
//! a [`JobOutcome`].

use serde::{Deserialize, Serialize};

use crate::types::JobId;

/// Fallback message when the backend reports `failed` without a reason.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Processing failed";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Backend lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted but not started. The backend's default row state is
    /// `pending`, which is treated the same way.
    #[serde(alias = "pending")]
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    /// `completed` and `failed` are terminal; no transition follows them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Readability and variation figures computed by the backend.
///
/// Keys the client does not know about are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetrics {
    #[serde(default)]
    pub flesch_kincaid_original: Option<f64>,
    #[serde(default)]
    pub flesch_kincaid_humanized: Option<f64>,
    #[serde(default)]
    pub burstiness_original: Option<f64>,
    #[serde(default)]
    pub burstiness_humanized: Option<f64>,
    #[serde(default)]
    pub avg_sentence_length_original: Option<f64>,
    #[serde(default)]
    pub avg_sentence_length_humanized: Option<f64>,
    #[serde(default)]
    pub lexical_diversity_original: Option<f64>,
    #[serde(default)]
    pub lexical_diversity_humanized: Option<f64>,
    #[serde(default)]
    pub perplexity: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One before/after row for display.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPair {
    pub label: &'static str,
    pub before: Option<f64>,
    pub after: Option<f64>,
}

impl MetricPair {
    /// `after - before`, when both sides are known.
    pub fn delta(&self) -> Option<f64> {
        Some(self.after? - self.before?)
    }
}

impl JobMetrics {
    /// Before/after rows in display order.
    pub fn pairs(&self) -> Vec<MetricPair> {
        vec![
            MetricPair {
                label: "Flesch-Kincaid Grade",
                before: self.flesch_kincaid_original,
                after: self.flesch_kincaid_humanized,
            },
            MetricPair {
                label: "Burstiness",
                before: self.burstiness_original,
                after: self.burstiness_humanized,
            },
            MetricPair {
                label: "Avg Sentence Length",
                before: self.avg_sentence_length_original,
                after: self.avg_sentence_length_humanized,
            },
            MetricPair {
                label: "Lexical Diversity",
                before: self.lexical_diversity_original,
                after: self.lexical_diversity_humanized,
            },
        ]
    }
}

// ---------------------------------------------------------------------------
// Status record
// ---------------------------------------------------------------------------

/// Snapshot of a job as reported by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStatusRecord {
    #[serde(default)]
    pub id: Option<JobId>,
    pub status: JobState,
    #[serde(default)]
    pub output_text: Option<String>,
    #[serde(default)]
    pub metrics: Option<JobMetrics>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub watermark_id: Option<String>,
    #[serde(default)]
    pub changes: Option<Vec<serde_json::Value>>,
}

impl JobStatusRecord {
    /// A bare record in the given state, with every optional field empty.
    pub fn with_state(status: JobState) -> Self {
        Self {
            id: None,
            status,
            output_text: None,
            metrics: None,
            error_message: None,
            watermark_id: None,
            changes: None,
        }
    }

    /// Terminal outcome of this record, or `None` while the job is queued or
    /// processing.
    pub fn outcome(&self, job_id: &JobId) -> Option<JobOutcome> {
        match self.status {
            JobState::Queued | JobState::Processing => None,
            JobState::Completed => Some(JobOutcome::Completed(CompletedJob {
                job_id: job_id.clone(),
                output_text: self.output_text.clone().unwrap_or_default(),
                metrics: self.metrics.clone(),
                changes: self.changes.clone().unwrap_or_default(),
                watermark_id: self.watermark_id.clone(),
            })),
            JobState::Failed => Some(JobOutcome::Failed {
                job_id: job_id.clone(),
                message: self
                    .error_message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a successfully completed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedJob {
    pub job_id: JobId,
    pub output_text: String,
    pub metrics: Option<JobMetrics>,
    pub changes: Vec<serde_json::Value>,
    /// Present for jobs run in academic integrity mode.
    pub watermark_id: Option<String>,
}

/// How a job ended, as observed by the poller.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(CompletedJob),
    Failed { job_id: JobId, message: String },
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn pending_is_an_alias_for_queued() {
        let record: JobStatusRecord = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(record.status, JobState::Queued);
        assert!(!record.status.is_terminal());
    }

    #[test]
    fn completed_record_keeps_output_verbatim() {
        let raw = r#"{
            "id": "job-1",
            "status": "completed",
            "output_text": "  Rewritten text, spacing kept.  ",
            "metrics": {"perplexity": 41.5, "flesch_kincaid_original": 12.0, "custom": 3},
            "error_message": null,
            "watermark_id": null
        }"#;
        let record: JobStatusRecord = serde_json::from_str(raw).unwrap();
        let outcome = record.outcome(&JobId::new("job-1"));

        assert_matches!(outcome, Some(JobOutcome::Completed(job)) => {
            assert_eq!(job.output_text, "  Rewritten text, spacing kept.  ");
            let metrics = job.metrics.unwrap();
            assert_eq!(metrics.perplexity, Some(41.5));
            assert_eq!(metrics.extra["custom"], 3);
            assert!(job.changes.is_empty());
        });
    }

    #[test]
    fn failed_record_without_message_uses_fallback() {
        let record = JobStatusRecord::with_state(JobState::Failed);
        assert_matches!(
            record.outcome(&JobId::new("x")),
            Some(JobOutcome::Failed { message, .. }) if message == DEFAULT_FAILURE_MESSAGE
        );
    }

    #[test]
    fn processing_has_no_outcome() {
        let record = JobStatusRecord::with_state(JobState::Processing);
        assert!(record.outcome(&JobId::new("x")).is_none());
    }

    #[test]
    fn metric_pair_delta_requires_both_sides() {
        let metrics = JobMetrics {
            burstiness_original: Some(2.0),
            burstiness_humanized: Some(5.5),
            lexical_diversity_original: Some(0.4),
            ..Default::default()
        };
        let pairs = metrics.pairs();
        assert_eq!(pairs[1].delta(), Some(3.5));
        assert_eq!(pairs[3].delta(), None);
    }
}
