//! Job orchestration on top of the humanization client.
//!
//! - [`workflow`]: one interactive submit + poll cycle with observable
//!   liveness state.
//! - [`batch`]: an ordered queue of file-derived jobs processed with bounded
//!   concurrency.
//! - [`history`]: the persisted list of recently saved results.
//! - [`export`]: writing outputs to plain-text files.

pub mod batch;
pub mod error;
pub mod export;
pub mod history;
pub mod queue;
pub mod workflow;

pub use batch::{BatchConfig, BatchWorkflow, CompletedOutput, TimeoutPolicy};
pub use error::{HumanizeError, StorageError};
pub use history::{RecentResults, SavedResult};
pub use queue::BatchQueue;
pub use workflow::{HumanizeWorkflow, WorkflowState};
