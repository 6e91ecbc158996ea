//! Resilient worker-service client for the dispatch gateway.
//!
//! The engine owns every interaction with the remote worker service: job
//! submission, status fetches, and the bounded-retry plumbing both ride on.
//! Request handlers never speak HTTP themselves; they depend on the
//! [`Engine`] trait so tests can swap in a scripted implementation.
//!
//! # Architecture
//!
//! - [`Engine`] - the seam the gateway depends on
//! - [`RemoteEngine`] - production implementation speaking the worker REST API
//! - [`Repeater`] / [`RetryPolicy`] - bounded retry with fixed or exponential backoff
//! - [`TestEngine`] - scripted engine for tests

mod error;
mod remote;
mod retry;

pub use error::EngineError;
pub use remote::{RemoteEngine, SubmitAck};
pub use retry::{Backoff, Repeater, RetryPolicy, UpstreamError};

// Re-export async_trait for convenience when implementing Engine
pub use async_trait::async_trait;

use std::sync::atomic::{AtomicUsize, Ordering};

use imgjobs_registry::{Job, JobStatus};

/// Upstream dispatch operations the gateway depends on.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// Submit a job draft and return the worker's acknowledgement.
    async fn submit_job(&self, draft: &Job) -> Result<SubmitAck, EngineError>;

    /// Fetch the current status of a job.
    async fn job_status(&self, id: &str) -> Result<JobStatus, EngineError>;
}

/// Scripted engine for tests: replays preset results and counts calls.
#[derive(Debug)]
pub struct TestEngine {
    submit: Result<SubmitAck, EngineError>,
    status: Result<JobStatus, EngineError>,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl TestEngine {
    pub fn new(
        submit: Result<SubmitAck, EngineError>,
        status: Result<JobStatus, EngineError>,
    ) -> Self {
        Self {
            submit,
            status,
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    /// Engine that acknowledges every submission and reports the given status.
    pub fn healthy(status: JobStatus) -> Self {
        Self::new(Ok(SubmitAck::default()), Ok(status))
    }

    /// Engine whose worker service never answers.
    pub fn unreachable() -> Self {
        let err = EngineError::Upstream(UpstreamError::Unreachable {
            attempts: 3,
            reason: "connection refused".into(),
        });
        Self::new(Err(err.clone()), Err(err))
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Engine for TestEngine {
    async fn submit_job(&self, _draft: &Job) -> Result<SubmitAck, EngineError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submit.clone()
    }

    async fn job_status(&self, _id: &str) -> Result<JobStatus, EngineError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.status.clone()
    }
}
