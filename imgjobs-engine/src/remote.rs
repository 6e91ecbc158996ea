//! Worker-service engine speaking the remote REST API.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use imgjobs_registry::{Job, JobStatus};

use crate::error::EngineError;
use crate::retry::{Repeater, RetryPolicy};
use crate::{async_trait, Engine};

/// Submission acknowledgement from the worker service.
///
/// The body is Job-shaped with error reporting alongside; only the fields the
/// gateway consumes are modeled here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitAck {
    /// The worker's idea of the job id, when it reports one.
    #[serde(default)]
    pub id: String,
    /// Where the worker stored the payload, when it reports that.
    #[serde(default)]
    pub payload_location: Option<String>,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub details: String,
}

/// Status response body from the worker service.
#[derive(Debug, Deserialize)]
struct StatusPayload {
    #[serde(default)]
    status: i32,
    #[serde(default)]
    error: String,
    #[serde(default)]
    details: String,
}

/// [`Engine`] implementation dispatching to a remote worker-service REST API.
#[derive(Debug, Clone)]
pub struct RemoteEngine {
    repeater: Repeater,
    base_url: String,
}

impl RemoteEngine {
    /// Build an engine rooted at `base_url`, applying `policy` to every
    /// upstream call. Trailing slashes on the base URL are trimmed so path
    /// assembly inserts exactly one separator.
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            repeater: Repeater::new(policy),
            base_url,
        }
    }
}

#[async_trait]
impl Engine for RemoteEngine {
    async fn submit_job(&self, draft: &Job) -> Result<SubmitAck, EngineError> {
        let url = format!("{}/job", self.base_url);
        let body = serde_json::to_vec(draft).map_err(|e| EngineError::Encode(e.to_string()))?;

        debug!("Submitting job to {}", url);
        let bytes = self.repeater.call(Method::POST, &url, Some(body)).await?;

        let ack: SubmitAck = serde_json::from_slice(&bytes).map_err(|e| {
            warn!("Failed to parse submission ack: {}", e);
            EngineError::Decode(e.to_string())
        })?;
        if !ack.error.is_empty() {
            return Err(EngineError::Rejected {
                error: ack.error,
                details: ack.details,
            });
        }
        Ok(ack)
    }

    async fn job_status(&self, id: &str) -> Result<JobStatus, EngineError> {
        let url = format!("{}/job/{}/status", self.base_url, id);

        debug!("Fetching job status from {}", url);
        let bytes = self.repeater.call(Method::GET, &url, None).await?;

        let payload: StatusPayload = serde_json::from_slice(&bytes).map_err(|e| {
            warn!("Failed to parse status response: {}", e);
            EngineError::Decode(e.to_string())
        })?;
        if !payload.error.is_empty() {
            return Err(EngineError::Rejected {
                error: payload.error,
                details: payload.details,
            });
        }
        Ok(JobStatus::from_code(payload.status))
    }
}
