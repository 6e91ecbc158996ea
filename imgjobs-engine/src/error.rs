//! Engine error types.

use thiserror::Error;

use crate::retry::UpstreamError;

/// Errors surfaced by engine operations.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// Terminal transport or protocol failure talking to the worker service.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    /// The worker service answered 200 but flagged the request as failed.
    #[error("worker service rejected the request: {error}")]
    Rejected { error: String, details: String },
    /// The worker service answered 200 with a body that does not parse.
    #[error("can't decode worker service response: {0}")]
    Decode(String),
    /// The outgoing request body could not be serialized.
    #[error("can't encode request body: {0}")]
    Encode(String),
}
