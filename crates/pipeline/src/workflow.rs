//! Single-job workflow: submit one request, poll it to a terminal state.
//!
//! [`HumanizeWorkflow`] is what an interactive front end drives. Its
//! liveness is published on a `watch` channel ([`WorkflowState`]), separate
//! from the [`EventBus`] stream, and always returns to
//! [`WorkflowState::Idle`] when a run ends, whichever way it ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use humanize_client::{JobBackend, JobPoller, PollConfig, PollError};
use humanize_core::request::JobRequest;
use humanize_core::status::{CompletedJob, JobOutcome};
use humanize_core::types::JobId;
use humanize_events::{EventBus, WorkflowEvent};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::HumanizeError;

/// Observable liveness of a [`HumanizeWorkflow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Submitting,
    Polling { job_id: JobId },
}

impl WorkflowState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Orchestrates one submission + poll cycle at a time.
pub struct HumanizeWorkflow {
    backend: Arc<dyn JobBackend>,
    poller: JobPoller,
    events: Option<Arc<EventBus>>,
    state: watch::Sender<WorkflowState>,
    current: Mutex<Option<ActiveRun>>,
    next_run: AtomicU64,
}

struct ActiveRun {
    id: u64,
    cancel: CancellationToken,
}

/// Resets the workflow to idle when the run that created it is still the
/// current one. Runs on every exit path, including a dropped future.
struct ResetOnExit<'a> {
    workflow: &'a HumanizeWorkflow,
    run_id: u64,
}

impl Drop for ResetOnExit<'_> {
    fn drop(&mut self) {
        let mut current = self.workflow.current.lock();
        if current.as_ref().is_some_and(|run| run.id == self.run_id) {
            *current = None;
            self.workflow.state.send_replace(WorkflowState::Idle);
        }
    }
}

impl HumanizeWorkflow {
    pub fn new(backend: Arc<dyn JobBackend>, poll_config: PollConfig) -> Self {
        let poller = JobPoller::new(Arc::clone(&backend), poll_config);
        let (state, _) = watch::channel(WorkflowState::Idle);
        Self {
            backend,
            poller,
            events: None,
            state,
            current: Mutex::new(None),
            next_run: AtomicU64::new(0),
        }
    }

    /// Publish job lifecycle events on `events`.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.poller = self.poller.with_events(Arc::clone(&events));
        self.events = Some(events);
        self
    }

    pub fn poll_config(&self) -> PollConfig {
        *self.poller.config()
    }

    /// Current liveness state.
    pub fn state(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    /// Whether a run is in flight.
    pub fn is_processing(&self) -> bool {
        !self.state.borrow().is_idle()
    }

    /// Cancel the in-flight run, if any. Its future settles with a
    /// cancelled error.
    pub fn cancel(&self) {
        if let Some(run) = self.current.lock().as_ref() {
            tracing::info!(run_id = run.id, "Cancelling in-flight run");
            run.cancel.cancel();
        }
    }

    /// Upload a file and return the text the backend extracted from it.
    pub async fn extract_text(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, HumanizeError> {
        self.backend
            .extract_text(file_name, bytes)
            .await
            .map_err(HumanizeError::Upload)
    }

    /// Submit `request` and poll it to a terminal state.
    ///
    /// A run already in flight is cancelled first.
    pub async fn run(&self, request: &JobRequest) -> Result<CompletedJob, HumanizeError> {
        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        {
            let mut current = self.current.lock();
            if let Some(previous) = current.replace(ActiveRun {
                id: run_id,
                cancel: cancel.clone(),
            }) {
                tracing::info!(run_id, superseded = previous.id, "Superseding in-flight run");
                previous.cancel.cancel();
            }
            self.state.send_replace(WorkflowState::Submitting);
        }
        let _reset = ResetOnExit {
            workflow: self,
            run_id,
        };

        submit_and_poll(
            self.backend.as_ref(),
            &self.poller,
            request,
            self.poll_config(),
            &cancel,
            self.events.as_deref(),
            |job_id| self.mark_polling(run_id, job_id),
        )
        .await
    }

    fn mark_polling(&self, run_id: u64, job_id: &JobId) {
        let current = self.current.lock();
        if current.as_ref().is_some_and(|run| run.id == run_id) {
            self.state.send_replace(WorkflowState::Polling {
                job_id: job_id.clone(),
            });
        }
    }
}

/// Submit, then poll until the job settles.
///
/// `on_submitted` runs once the backend has accepted the job and before the
/// first status query. Both steps stop early when `cancel` fires.
pub(crate) async fn submit_and_poll(
    backend: &dyn JobBackend,
    poller: &JobPoller,
    request: &JobRequest,
    config: PollConfig,
    cancel: &CancellationToken,
    events: Option<&EventBus>,
    on_submitted: impl FnOnce(&JobId),
) -> Result<CompletedJob, HumanizeError> {
    let publish = |event: WorkflowEvent| {
        if let Some(bus) = events {
            bus.publish(event);
        }
    };

    let submitted = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(PollError::Cancelled.into()),
        submitted = backend.submit(request) => submitted,
    };
    let job_id = match submitted {
        Ok(job_id) => job_id,
        Err(e) => {
            tracing::warn!(error = %e, "Job submission failed");
            publish(WorkflowEvent::JobFailed {
                job_id: None,
                error: e.to_string(),
            });
            return Err(e.into());
        }
    };

    tracing::info!(job_id = %job_id, "Job submitted");
    publish(WorkflowEvent::JobSubmitted {
        job_id: job_id.clone(),
    });
    on_submitted(&job_id);

    let outcome = poller
        .start_with(job_id.clone(), config, cancel)?
        .wait()
        .await;

    match outcome {
        Ok(JobOutcome::Completed(done)) => {
            publish(WorkflowEvent::JobCompleted {
                job_id: done.job_id.clone(),
            });
            Ok(done)
        }
        Ok(JobOutcome::Failed { job_id, message }) => {
            tracing::warn!(job_id = %job_id, error = %message, "Job failed on the backend");
            publish(WorkflowEvent::JobFailed {
                job_id: Some(job_id.clone()),
                error: message.clone(),
            });
            Err(HumanizeError::JobFailed { job_id, message })
        }
        Err(e) => {
            let err = HumanizeError::from(e);
            if !err.is_cancelled() {
                publish(WorkflowEvent::JobFailed {
                    job_id: Some(job_id),
                    error: err.to_string(),
                });
            }
            Err(err)
        }
    }
}
