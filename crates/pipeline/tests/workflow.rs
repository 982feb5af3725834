//! Single-job workflow: outcomes, liveness state and supersession.

mod common;

use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use humanize_client::{HumanizeApi, PollConfig, SubmissionError};
use humanize_core::request::{JobParameters, JobRequest};
use humanize_core::types::JobId;
use humanize_events::{EventBus, WorkflowEvent};
use humanize_pipeline::{HumanizeError, HumanizeWorkflow, WorkflowState};

use common::FakeBackend;

fn request(text: &str) -> JobRequest {
    JobRequest::new(text, JobParameters::default()).unwrap()
}

fn workflow(backend: &Arc<FakeBackend>) -> HumanizeWorkflow {
    HumanizeWorkflow::new(backend.clone(), PollConfig::default())
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn run_returns_output_and_goes_idle() {
    let backend = Arc::new(FakeBackend::new().processing_rounds(2));
    let workflow = workflow(&backend);

    let done = workflow.run(&request("Robotic prose.")).await.unwrap();

    assert_eq!(done.output_text, "humanized: Robotic prose.");
    assert_eq!(done.job_id, JobId::new("job-1"));
    assert_eq!(workflow.state(), WorkflowState::Idle);
    assert!(!workflow.is_processing());
    assert_eq!(backend.status_calls("job-1"), 3);
}

#[tokio::test(start_paused = true)]
async fn submission_rejection_surfaces_backend_message() {
    let backend = Arc::new(FakeBackend::new().fail_submission(1));
    let workflow = workflow(&backend);

    let err = workflow.run(&request("text")).await.unwrap_err();

    assert_matches!(err, HumanizeError::Submission(_));
    assert_eq!(err.to_string(), "Insufficient credits");
    assert!(!workflow.is_processing());
    assert_eq!(backend.total_status_calls(), 0);
}

#[tokio::test]
async fn unreachable_backend_keeps_transport_cause() {
    // Port 9 (discard) is closed on test hosts.
    let api = Arc::new(HumanizeApi::new("http://127.0.0.1:9"));
    let workflow = HumanizeWorkflow::new(api, PollConfig::default());

    let err = workflow.run(&request("text")).await.unwrap_err();

    assert_matches!(
        err,
        HumanizeError::Submission(SubmissionError::Transport(_))
    );
    assert_eq!(err.to_string(), "Could not reach the processing service");
    let cause = err.source().map(|c| c.to_string()).unwrap_or_default();
    assert!(!cause.is_empty(), "HTTP failure is kept behind source()");
    assert!(!workflow.is_processing());
}

#[tokio::test(start_paused = true)]
async fn backend_failure_surfaces_its_message() {
    let backend = Arc::new(FakeBackend::new().fail_job("job-1", "Model overloaded"));
    let workflow = workflow(&backend);

    let err = workflow.run(&request("text")).await.unwrap_err();

    assert_matches!(&err, HumanizeError::JobFailed { job_id, .. } if job_id.as_str() == "job-1");
    assert_eq!(err.to_string(), "Model overloaded");
    assert!(!workflow.is_processing());
}

#[tokio::test(start_paused = true)]
async fn timeout_clears_processing_flag() {
    let backend = Arc::new(FakeBackend::new().never_finish());
    let workflow = workflow(&backend);

    let err = workflow.run(&request("text")).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "Processing timeout");
    assert_eq!(workflow.state(), WorkflowState::Idle);
    assert_eq!(backend.status_calls("job-1"), 30);
}

// ---------------------------------------------------------------------------
// Liveness and cancellation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn state_tracks_polling_and_cancel_resets_it() {
    let backend = Arc::new(FakeBackend::new().never_finish());
    let workflow = Arc::new(workflow(&backend));
    let mut states = workflow.subscribe_state();

    let running = {
        let workflow = Arc::clone(&workflow);
        tokio::spawn(async move { workflow.run(&request("text")).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        workflow.state(),
        WorkflowState::Polling {
            job_id: JobId::new("job-1")
        }
    );
    assert!(workflow.is_processing());

    workflow.cancel();
    let err = running.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());

    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), WorkflowState::Idle);

    let seen = backend.status_calls("job-1");
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(backend.status_calls("job-1"), seen);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_run_future_resets_state() {
    let backend = Arc::new(FakeBackend::new().never_finish());
    let workflow = workflow(&backend);

    let cut_short =
        tokio::time::timeout(Duration::from_secs(5), workflow.run(&request("text"))).await;

    assert!(cut_short.is_err());
    assert_eq!(workflow.state(), WorkflowState::Idle);

    let seen = backend.status_calls("job-1");
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(backend.status_calls("job-1"), seen, "poll stopped with the run");
}

#[tokio::test(start_paused = true)]
async fn new_run_supersedes_the_previous_one() {
    let backend = Arc::new(FakeBackend::new().processing_rounds(3));
    let workflow = Arc::new(workflow(&backend));

    let first = {
        let workflow = Arc::clone(&workflow);
        tokio::spawn(async move { workflow.run(&request("first")).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;

    let second = workflow.run(&request("second")).await.unwrap();
    assert_eq!(second.output_text, "humanized: second");

    let first = first.await.unwrap();
    assert_matches!(first, Err(ref e) if e.is_cancelled());
    assert_eq!(backend.status_calls("job-1"), 1);
    assert_eq!(workflow.state(), WorkflowState::Idle);
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn lifecycle_events_are_published() {
    let backend = Arc::new(FakeBackend::new());
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let workflow = workflow(&backend).with_events(bus);

    workflow.run(&request("text")).await.unwrap();

    let mut events = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        events.push(envelope.event);
    }
    let job_id = JobId::new("job-1");
    assert_eq!(events.first(), Some(&WorkflowEvent::JobSubmitted { job_id: job_id.clone() }));
    assert_eq!(events.last(), Some(&WorkflowEvent::JobCompleted { job_id }));
}
