//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`WorkflowEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` between the poller, the
//! workflows, and whatever presentation layer renders progress.

use chrono::{DateTime, Utc};
use humanize_core::batch::BatchItemStatus;
use humanize_core::status::JobState;
use humanize_core::types::{ItemId, JobId};
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// WorkflowEvent
// ---------------------------------------------------------------------------

/// A state change in job orchestration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// The backend accepted a request and assigned a job id.
    JobSubmitted { job_id: JobId },

    /// A poll observed a different backend state than the previous one.
    JobStatusChanged { job_id: JobId, state: JobState },

    /// The job reached `completed`.
    JobCompleted { job_id: JobId },

    /// The job ended without output. Not published for cancelled runs.
    JobFailed {
        job_id: Option<JobId>,
        /// Human-readable reason, as shown to the user.
        error: String,
    },

    /// A batch item changed status.
    BatchItemUpdated {
        item_id: ItemId,
        status: BatchItemStatus,
    },

    /// A batch item was removed from the queue.
    BatchItemRemoved { item_id: ItemId },

    /// Every eligible item of a batch run reached a terminal status.
    BatchFinished { completed: usize, failed: usize },
}

/// A [`WorkflowEvent`] stamped with the time it was published.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    #[serde(flatten)]
    pub event: WorkflowEvent,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use humanize_events::bus::{EventBus, WorkflowEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(WorkflowEvent::BatchFinished { completed: 1, failed: 0 });
/// ```
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: WorkflowEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(EventEnvelope {
            event,
            timestamp: Utc::now(),
        });
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
