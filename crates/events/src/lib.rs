//! Orchestration event stream.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`WorkflowEvent`] -- the state transitions a presentation layer renders
//!   (job submitted, status changed, batch item updated, ...).

pub mod bus;

pub use bus::{EventBus, EventEnvelope, WorkflowEvent};
