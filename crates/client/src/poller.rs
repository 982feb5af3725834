//! Fixed-interval job status polling with a global deadline.
//!
//! [`poll_until_terminal`] is the loop itself: query, react, sleep, repeat,
//! racing every suspension point against the deadline and a
//! [`CancellationToken`]. [`JobPoller`] runs that loop as a spawned task and
//! hands out a [`PollHandle`] owning the task and its token, so callers never
//! see raw timers.
//!
//! The first query is issued immediately; later queries follow at
//! `interval`. When the next query time coincides with the deadline the
//! deadline wins, so with a 2s interval and a 60s timeout at most 30 queries
//! are made (t = 0, 2, ..., 58 s).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use humanize_core::status::{JobOutcome, JobState};
use humanize_core::types::JobId;
use humanize_events::{EventBus, WorkflowEvent};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::backend::JobBackend;
use crate::error::PollError;

/// Default delay between two status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default time allowed for a job to reach a terminal state.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Polling cadence and deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollConfig {
    /// Same interval, different timeout.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

/// Poll `job_id` until it reaches a terminal state.
///
/// Settles exactly once: with the job's outcome, [`PollError::Timeout`] when
/// the deadline passes, [`PollError::Transport`] on the first failed query,
/// or [`PollError::Cancelled`] when `cancel` fires. No query is issued after
/// settlement; an in-flight query is dropped when the deadline or
/// cancellation wins the race.
pub async fn poll_until_terminal(
    backend: &dyn JobBackend,
    job_id: &JobId,
    config: &PollConfig,
    cancel: &CancellationToken,
    events: Option<&EventBus>,
) -> Result<JobOutcome, PollError> {
    let started = Instant::now();
    let expired = tokio::time::sleep_until(started + config.timeout);
    tokio::pin!(expired);

    let timeout = || PollError::Timeout {
        job_id: job_id.clone(),
        timeout: config.timeout,
    };

    let mut last_state: Option<JobState> = None;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let record = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = &mut expired => return Err(timeout()),
            result = backend.job_status(job_id) => match result {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        job_id = %job_id,
                        attempt,
                        error = %e,
                        "Job status query failed"
                    );
                    return Err(e.into());
                }
            },
        };

        tracing::debug!(
            job_id = %job_id,
            attempt,
            state = record.status.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Polled job status",
        );

        if last_state != Some(record.status) {
            last_state = Some(record.status);
            if let Some(bus) = events {
                bus.publish(WorkflowEvent::JobStatusChanged {
                    job_id: job_id.clone(),
                    state: record.status,
                });
            }
        }

        if let Some(outcome) = record.outcome(job_id) {
            tracing::info!(
                job_id = %job_id,
                attempts = attempt,
                state = record.status.as_str(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job reached terminal state",
            );
            return Ok(outcome);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = &mut expired => {
                tracing::warn!(
                    job_id = %job_id,
                    attempts = attempt,
                    timeout_ms = config.timeout.as_millis() as u64,
                    "Job did not finish before the deadline",
                );
                return Err(timeout());
            }
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// JobPoller / PollHandle
// ---------------------------------------------------------------------------

/// Spawns poll loops and guarantees at most one live loop per job id.
#[derive(Clone)]
pub struct JobPoller {
    backend: Arc<dyn JobBackend>,
    config: PollConfig,
    events: Option<Arc<EventBus>>,
    /// Job ids with a running poll task.
    active: Arc<Mutex<HashSet<JobId>>>,
}

/// A running poll: cancel it, or await its single result.
///
/// Dropping a handle without awaiting it cancels the poll.
pub struct PollHandle {
    job_id: JobId,
    cancel: CancellationToken,
    task: JoinHandle<Result<JobOutcome, PollError>>,
    _guard: DropGuard,
}

/// Removes a job id from the active set when its poll task ends.
struct Registration {
    active: Arc<Mutex<HashSet<JobId>>>,
    job_id: JobId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.active.lock().remove(&self.job_id);
    }
}

impl JobPoller {
    pub fn new(backend: Arc<dyn JobBackend>, config: PollConfig) -> Self {
        Self {
            backend,
            config,
            events: None,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Publish observed status changes on `events`.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Whether a poll task for `job_id` is currently running.
    pub fn is_polling(&self, job_id: &JobId) -> bool {
        self.active.lock().contains(job_id)
    }

    /// Start polling with the poller's default configuration.
    pub fn start(&self, job_id: JobId) -> Result<PollHandle, PollError> {
        self.start_with(job_id, self.config, &CancellationToken::new())
    }

    /// Start polling with an explicit configuration. The poll is also
    /// cancelled when `parent` is.
    pub fn start_with(
        &self,
        job_id: JobId,
        config: PollConfig,
        parent: &CancellationToken,
    ) -> Result<PollHandle, PollError> {
        if !self.active.lock().insert(job_id.clone()) {
            return Err(PollError::AlreadyPolling(job_id));
        }
        let registration = Registration {
            active: Arc::clone(&self.active),
            job_id: job_id.clone(),
        };

        let cancel = parent.child_token();
        let token = cancel.clone();
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let id = job_id.clone();

        let task = tokio::spawn(async move {
            let _registration = registration;
            poll_until_terminal(backend.as_ref(), &id, &config, &token, events.as_deref()).await
        });

        Ok(PollHandle {
            job_id,
            cancel: cancel.clone(),
            task,
            _guard: cancel.drop_guard(),
        })
    }

    /// Poll `job_id` to completion with the default configuration.
    pub async fn poll(&self, job_id: JobId) -> Result<JobOutcome, PollError> {
        self.start(job_id)?.wait().await
    }
}

impl std::fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollHandle")
            .field("job_id", &self.job_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl PollHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Stop the poll. No further queries are issued; [`wait`](Self::wait)
    /// resolves with [`PollError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the poll to settle.
    pub async fn wait(self) -> Result<JobOutcome, PollError> {
        let PollHandle { task, _guard, .. } = self;
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(PollError::Cancelled),
            Err(e) => Err(PollError::Transport(format!("poll task failed: {e}"))),
        }
    }
}
