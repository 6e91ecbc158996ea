use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use imgjobs_auth::AuthError;
use imgjobs_engine::{EngineError, UpstreamError};
use imgjobs_registry::RegistryError;

use crate::integrity::IntegrityError;

/// Numeric codes carried in the error envelope; part of the public API.
pub mod codes {
    pub const INTERNAL: i32 = 0;
    pub const MALFORMED_BODY: i32 = 1;
    pub const INTEGRITY: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UPSTREAM: i32 = 5;
}

/// Top-level API error shared by all route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication error: {0}")]
    Authentication(#[from] AuthError),
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),
    #[error("not found: {0}")]
    NotFound(#[from] RegistryError),
    #[error("upstream error: {0}")]
    Upstream(#[from] EngineError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn malformed_body(message: impl Into<String>) -> Self {
        Self::MalformedBody(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// The (status, code, details) triple rendered into the envelope.
    fn classify(&self) -> (StatusCode, i32, &'static str) {
        match self {
            ApiError::Authentication(_) => {
                (StatusCode::UNAUTHORIZED, codes::AUTH, "JWT is invalid")
            }
            ApiError::MalformedBody(_) => (
                StatusCode::BAD_REQUEST,
                codes::MALFORMED_BODY,
                "can't unmarshal request message",
            ),
            ApiError::Integrity(_) => (
                StatusCode::BAD_REQUEST,
                codes::INTEGRITY,
                "error during md5 validation",
            ),
            ApiError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "error during getting job",
            ),
            ApiError::Upstream(engine) => {
                let details = "error during calling worker service";
                match engine {
                    EngineError::Upstream(UpstreamError::Unreachable { .. }) => {
                        (StatusCode::BAD_GATEWAY, codes::UPSTREAM, details)
                    }
                    EngineError::Upstream(UpstreamError::Timeout { .. }) => {
                        (StatusCode::GATEWAY_TIMEOUT, codes::UPSTREAM, details)
                    }
                    EngineError::Upstream(UpstreamError::BadResponse { .. })
                    | EngineError::Rejected { .. }
                    | EngineError::Decode(_) => {
                        (StatusCode::BAD_REQUEST, codes::UPSTREAM, details)
                    }
                    EngineError::Encode(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        codes::INTERNAL,
                        "unexpected internal error",
                    ),
                }
            }
            ApiError::Unexpected(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                "unexpected internal error",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, details) = self.classify();
        let payload = json!({
            "error": self.to_string(),
            "code": code,
            "details": details,
        });
        (status, Json(payload)).into_response()
    }
}
