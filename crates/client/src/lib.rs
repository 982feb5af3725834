//! Humanization backend client.
//!
//! Provides the REST wrapper ([`api::HumanizeApi`]), the [`backend::JobBackend`]
//! seam the orchestration layer is written against, the submission and
//! polling error taxonomy, and the cancellable fixed-interval
//! [`poller::JobPoller`].

pub mod api;
pub mod backend;
pub mod error;
pub mod poller;

pub use api::{ApiError, HumanizeApi};
pub use backend::JobBackend;
pub use error::{PollError, SubmissionError};
pub use poller::{JobPoller, PollConfig, PollHandle};
