//! Multi-file batch processing.
//!
//! [`BatchWorkflow`] owns a [`BatchQueue`] of file-derived items. [`run`]
//! takes every `pending` item in queue order through upload, submission and
//! polling, recording `completed` or `failed` per item. One item's failure
//! never stops the others and `run` itself never fails.
//!
//! [`run`]: BatchWorkflow::run

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use humanize_client::{JobBackend, JobPoller, PollConfig};
use humanize_core::batch::{BatchItem, BatchItemStatus, SourceFile};
use humanize_core::error::CoreError;
use humanize_core::request::{JobParameters, JobRequest};
use humanize_core::status::CompletedJob;
use humanize_core::types::{ItemId, JobId};
use humanize_events::{EventBus, WorkflowEvent};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::HumanizeError;
use crate::queue::BatchQueue;
use crate::workflow::submit_and_poll;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How the poll timeout applies across a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// Every item gets the full poll timeout.
    #[default]
    PerItem,
    /// One deadline for the whole run; each item polls for the time left.
    SharedDeadline,
}

impl FromStr for TimeoutPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_item" => Ok(Self::PerItem),
            "shared" | "shared_deadline" => Ok(Self::SharedDeadline),
            other => Err(CoreError::Validation(format!(
                "Unknown batch timeout policy: '{other}'. Valid: per_item, shared"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub poll: PollConfig,
    /// Items processed at once. Values below 1 are treated as 1.
    pub max_concurrency: usize,
    pub timeout_policy: TimeoutPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            max_concurrency: 1,
            timeout_policy: TimeoutPolicy::PerItem,
        }
    }
}

/// A completed item's output, ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedOutput {
    pub item_id: ItemId,
    pub name: String,
    pub output: String,
}

// ---------------------------------------------------------------------------
// BatchWorkflow
// ---------------------------------------------------------------------------

pub struct BatchWorkflow {
    backend: Arc<dyn JobBackend>,
    poller: JobPoller,
    config: BatchConfig,
    events: Option<Arc<EventBus>>,
    parameters: parking_lot::RwLock<JobParameters>,
    queue: RwLock<BatchQueue>,
    /// Cancellation tokens of items currently being processed.
    in_flight: parking_lot::Mutex<HashMap<ItemId, CancellationToken>>,
    /// Held for the duration of a run.
    running: Mutex<()>,
    /// Parent of every item token. Replaced at the start of each run.
    cancel: parking_lot::Mutex<CancellationToken>,
}

impl BatchWorkflow {
    pub fn new(backend: Arc<dyn JobBackend>, config: BatchConfig) -> Self {
        let poller = JobPoller::new(Arc::clone(&backend), config.poll);
        Self {
            backend,
            poller,
            config,
            events: None,
            parameters: parking_lot::RwLock::new(JobParameters::default()),
            queue: RwLock::new(BatchQueue::new()),
            in_flight: parking_lot::Mutex::new(HashMap::new()),
            running: Mutex::new(()),
            cancel: parking_lot::Mutex::new(CancellationToken::new()),
        }
    }

    /// Publish batch and job events on `events`.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.poller = self.poller.with_events(Arc::clone(&events));
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Parameters shared by every item of the batch.
    pub fn parameters(&self) -> JobParameters {
        self.parameters.read().clone()
    }

    pub fn set_parameters(&self, parameters: JobParameters) {
        *self.parameters.write() = parameters;
    }

    // ---- queue management ----

    /// Queue a file from disk. Files failing the intake rules are rejected
    /// and never enter the queue.
    pub async fn add_path(&self, path: impl AsRef<Path>) -> Result<ItemId, HumanizeError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| HumanizeError::ReadFile {
                name: name.clone(),
                source,
            })?;

        let item = BatchItem::new(name, SourceFile::Path(path.to_path_buf()), metadata.len())?;
        Ok(self.enqueue(item).await)
    }

    /// Queue in-memory file contents under `name`.
    pub async fn add_inline(
        &self,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<ItemId, HumanizeError> {
        let size = bytes.len() as u64;
        let item = BatchItem::new(name, SourceFile::Inline(bytes), size)?;
        Ok(self.enqueue(item).await)
    }

    async fn enqueue(&self, item: BatchItem) -> ItemId {
        tracing::debug!(
            item_id = %item.id,
            name = %item.name,
            size = item.size,
            "Queued batch item"
        );
        let id = self.queue.write().await.push(item);
        self.publish(WorkflowEvent::BatchItemUpdated {
            item_id: id,
            status: BatchItemStatus::Pending,
        });
        id
    }

    /// Remove an item. If it is being processed its poll is cancelled and
    /// its result is discarded. Returns whether the item was queued.
    pub async fn remove_item(&self, id: &ItemId) -> bool {
        let removed = self.queue.write().await.remove(id);
        if let Some(token) = self.in_flight.lock().remove(id) {
            token.cancel();
        }
        match removed {
            Some(item) => {
                tracing::info!(item_id = %id, name = %item.name, "Removed batch item");
                self.publish(WorkflowEvent::BatchItemRemoved { item_id: *id });
                true
            }
            None => false,
        }
    }

    /// Snapshot of all items in queue order.
    pub async fn items(&self) -> Vec<BatchItem> {
        self.queue.read().await.snapshot()
    }

    pub async fn item(&self, id: &ItemId) -> Option<BatchItem> {
        self.queue.read().await.get(id).cloned()
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Cancel every item of the current run. Cancelled items end up
    /// `failed`; a later `run` starts afresh.
    pub fn cancel_all(&self) {
        self.cancel.lock().cancel();
    }

    // ---- processing ----

    /// Process all `pending` items and return a snapshot of the queue.
    ///
    /// Items start in queue order, at most `max_concurrency` at a time. A
    /// call made while another run is in progress returns the current
    /// snapshot without processing anything.
    pub async fn run(&self) -> Vec<BatchItem> {
        let Ok(_running) = self.running.try_lock() else {
            tracing::debug!("Batch run already in progress");
            return self.items().await;
        };

        let pending = self.queue.read().await.pending_ids();
        if pending.is_empty() {
            tracing::info!("No pending files to process");
            return self.items().await;
        }

        let concurrency = self.config.max_concurrency.max(1);
        let deadline = match self.config.timeout_policy {
            TimeoutPolicy::PerItem => None,
            TimeoutPolicy::SharedDeadline => Some(Instant::now() + self.config.poll.timeout),
        };
        let parameters = self.parameters();
        let cancel = CancellationToken::new();
        *self.cancel.lock() = cancel.clone();

        tracing::info!(items = pending.len(), concurrency, "Starting batch run");

        futures::stream::iter(pending)
            .for_each_concurrent(concurrency, |id| {
                let parameters = &parameters;
                let cancel = &cancel;
                async move { self.process_item(id, parameters, cancel, deadline).await }
            })
            .await;

        let snapshot = self.items().await;
        let completed = count(&snapshot, BatchItemStatus::Completed);
        let failed = count(&snapshot, BatchItemStatus::Failed);
        tracing::info!(completed, failed, "Batch run finished");
        self.publish(WorkflowEvent::BatchFinished { completed, failed });
        snapshot
    }

    async fn process_item(
        &self,
        id: ItemId,
        parameters: &JobParameters,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) {
        let token = cancel.child_token();
        let (name, source) = {
            let mut queue = self.queue.write().await;
            let Some(item) = queue.get_mut(&id) else {
                return;
            };
            if item.status != BatchItemStatus::Pending {
                return;
            }
            if let Err(e) = item.transition(BatchItemStatus::Processing) {
                tracing::error!(item_id = %id, error = %e, "Could not start batch item");
                return;
            }
            self.in_flight.lock().insert(id, token.clone());
            (item.name.clone(), item.source.clone())
        };
        self.publish(WorkflowEvent::BatchItemUpdated {
            item_id: id,
            status: BatchItemStatus::Processing,
        });

        let submitted = parking_lot::Mutex::new(None::<JobId>);
        let result = self
            .execute_item(&name, source, parameters, &token, deadline, &submitted)
            .await;
        self.in_flight.lock().remove(&id);

        let mut queue = self.queue.write().await;
        let Some(item) = queue.get_mut(&id) else {
            tracing::debug!(item_id = %id, "Item removed while processing; result discarded");
            return;
        };
        item.job_id = submitted.into_inner();
        let status = match result {
            Ok(done) => {
                tracing::info!(item_id = %id, job_id = %done.job_id, "Batch item completed");
                item.job_id = Some(done.job_id);
                // An empty output is re-fetched on collection.
                item.output = (!done.output_text.is_empty()).then_some(done.output_text);
                BatchItemStatus::Completed
            }
            Err(e) => {
                tracing::warn!(item_id = %id, name = %name, error = %e, "Batch item failed");
                item.error = Some(e.to_string());
                BatchItemStatus::Failed
            }
        };
        if let Err(e) = item.transition(status) {
            tracing::error!(item_id = %id, error = %e, "Could not record batch item result");
            return;
        }
        drop(queue);
        self.publish(WorkflowEvent::BatchItemUpdated { item_id: id, status });
    }

    async fn execute_item(
        &self,
        name: &str,
        source: SourceFile,
        parameters: &JobParameters,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
        submitted: &parking_lot::Mutex<Option<JobId>>,
    ) -> Result<CompletedJob, HumanizeError> {
        remaining(deadline)?;

        let bytes = match source {
            SourceFile::Inline(bytes) => bytes,
            SourceFile::Path(path) => {
                tokio::fs::read(&path)
                    .await
                    .map_err(|source| HumanizeError::ReadFile {
                        name: name.to_string(),
                        source,
                    })?
            }
        };

        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(humanize_client::PollError::Cancelled.into()),
            text = self.backend.extract_text(name, bytes) => text.map_err(HumanizeError::Upload)?,
        };
        let request = JobRequest::new(text, parameters.clone())?;

        // Time spent reading and uploading counts against a shared deadline.
        let poll = match remaining(deadline)? {
            None => self.config.poll,
            Some(left) => self.config.poll.with_timeout(left),
        };

        submit_and_poll(
            self.backend.as_ref(),
            &self.poller,
            &request,
            poll,
            cancel,
            self.events.as_deref(),
            |job_id| *submitted.lock() = Some(job_id.clone()),
        )
        .await
    }

    // ---- results ----

    /// Outputs of all completed items, in queue order.
    ///
    /// A completed item without a stored output is re-fetched from the
    /// backend by job id; items whose output cannot be resolved are skipped.
    pub async fn collect_completed(&self) -> Vec<CompletedOutput> {
        let completed: Vec<BatchItem> = self
            .queue
            .read()
            .await
            .iter()
            .filter(|item| item.status == BatchItemStatus::Completed)
            .cloned()
            .collect();

        let mut outputs = Vec::with_capacity(completed.len());
        for item in completed {
            let output = match (item.output, &item.job_id) {
                (Some(output), _) => Some(output),
                (None, Some(job_id)) => self.refetch_output(&item.id, job_id).await,
                (None, None) => None,
            };
            match output {
                Some(output) => outputs.push(CompletedOutput {
                    item_id: item.id,
                    name: item.name,
                    output,
                }),
                None => {
                    tracing::warn!(item_id = %item.id, "No output available for completed item")
                }
            }
        }
        outputs
    }

    async fn refetch_output(&self, item_id: &ItemId, job_id: &JobId) -> Option<String> {
        match self.backend.job_status(job_id).await {
            Ok(record) => {
                let output = record.output_text?;
                if let Some(item) = self.queue.write().await.get_mut(item_id) {
                    item.output = Some(output.clone());
                }
                Some(output)
            }
            Err(e) => {
                tracing::warn!(
                    item_id = %item_id,
                    job_id = %job_id,
                    error = %e,
                    "Could not re-fetch job output"
                );
                None
            }
        }
    }

    fn publish(&self, event: WorkflowEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

/// Time left before `deadline`, or `None` without one.
fn remaining(deadline: Option<Instant>) -> Result<Option<Duration>, HumanizeError> {
    let Some(deadline) = deadline else {
        return Ok(None);
    };
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(HumanizeError::DeadlineExceeded);
    }
    Ok(Some(left))
}

fn count(items: &[BatchItem], status: BatchItemStatus) -> usize {
    items.iter().filter(|item| item.status == status).count()
}
