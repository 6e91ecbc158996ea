//! Bounded-retry HTTP plumbing for worker-service calls.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use reqwest::{Client, Method, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

/// Longest upstream body excerpt carried inside an error.
const BODY_EXCERPT_LIMIT: usize = 256;

/// Delay growth strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed,
    /// Delay doubles after each failed attempt.
    Exponential,
}

impl FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "exponential" => Ok(Self::Exponential),
            other => Err(format!("unknown backoff strategy: {other}")),
        }
    }
}

impl fmt::Display for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fixed => "fixed",
            Self::Exponential => "exponential",
        })
    }
}

/// Retry behavior for a single logical upstream call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts before giving up, counting the first one.
    pub max_attempts: u32,
    /// Base delay between attempts.
    pub delay: Duration,
    pub backoff: Backoff,
    /// Timeout applied to each individual HTTP attempt.
    pub attempt_timeout: Duration,
    /// Wall-clock budget across all attempts and delays.
    pub total_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            backoff: Backoff::Fixed,
            attempt_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given 1-based attempt fails.
    fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => self
                .delay
                .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1))),
        }
    }
}

/// Terminal upstream failure classification.
#[derive(Debug, Error, Clone)]
pub enum UpstreamError {
    /// No attempt produced an HTTP response.
    #[error("worker service unreachable after {attempts} attempt(s): {reason}")]
    Unreachable { attempts: u32, reason: String },
    /// The retry budget ran out while failures were still retryable.
    #[error("retry budget of {budget_ms}ms exhausted after {attempts} attempt(s)")]
    Timeout { attempts: u32, budget_ms: u64 },
    /// A connection was made but the response was unusable.
    #[error("worker service returned status {status}: {body}")]
    BadResponse { status: u16, body: String },
}

/// One failed attempt, before terminal classification.
#[derive(Debug, Error)]
enum AttemptFailure {
    #[error("{0}")]
    Transport(String),
    #[error("status {status}: {body}")]
    Response { status: u16, body: String },
}

impl AttemptFailure {
    fn into_terminal(self, attempts: u32) -> UpstreamError {
        match self {
            Self::Transport(reason) => UpstreamError::Unreachable { attempts, reason },
            Self::Response { status, body } => UpstreamError::BadResponse { status, body },
        }
    }
}

/// HTTP caller that retries failed attempts under a [`RetryPolicy`].
///
/// Every failure mode is a retry candidate while attempts and budget remain;
/// classification into a terminal [`UpstreamError`] happens only when the
/// policy is spent.
#[derive(Debug, Clone)]
pub struct Repeater {
    client: Client,
    policy: RetryPolicy,
}

impl Repeater {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!("imgjobs/", env!("CARGO_PKG_VERSION")))
                .timeout(policy.attempt_timeout)
                .build()
                .expect("failed to build HTTP client"),
            policy,
        }
    }

    /// Issue `method url` until an attempt succeeds or the policy is spent,
    /// returning the raw response body.
    pub async fn call(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, UpstreamError> {
        let started = Instant::now();
        let mut attempt: u32 = 1;
        loop {
            match self.attempt(method.clone(), url, body.as_deref()).await {
                Ok(bytes) => {
                    if attempt > 1 {
                        debug!("Upstream call to {} succeeded on attempt {}", url, attempt);
                    }
                    return Ok(bytes);
                }
                Err(failure) => {
                    warn!(
                        "Attempt {}/{} against {} failed: {}",
                        attempt, self.policy.max_attempts, url, failure
                    );
                    if attempt >= self.policy.max_attempts {
                        return Err(failure.into_terminal(attempt));
                    }
                    let wait = self.policy.delay_after(attempt);
                    if started.elapsed() + wait > self.policy.total_timeout {
                        return Err(UpstreamError::Timeout {
                            attempts: attempt,
                            budget_ms: self.policy.total_timeout.as_millis() as u64,
                        });
                    }
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One HTTP attempt. Strictly status 200 counts as success.
    async fn attempt(
        &self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<Vec<u8>, AttemptFailure> {
        let mut request = self
            .client
            .request(method, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(bytes) = body {
            request = request.body(bytes.to_vec());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptFailure::Response {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        match response.bytes().await {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(e) => Err(AttemptFailure::Response {
                status: status.as_u16(),
                body: format!("body read failed: {e}"),
            }),
        }
    }
}

fn excerpt(body: &str) -> String {
    if body.len() <= BODY_EXCERPT_LIMIT {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::routing::{get, post};
    use axum::Router;

    async fn spawn_upstream(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(20),
            backoff: Backoff::Fixed,
            attempt_timeout: Duration::from_secs(2),
            total_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_backoff_parsing() {
        assert_eq!("fixed".parse::<Backoff>().unwrap(), Backoff::Fixed);
        assert_eq!(
            "exponential".parse::<Backoff>().unwrap(),
            Backoff::Exponential
        );
        assert!("linear".parse::<Backoff>().is_err());
    }

    #[test]
    fn test_delay_growth() {
        let mut policy = quick_policy();
        policy.delay = Duration::from_millis(100);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(5), Duration::from_millis(100));

        policy.backoff = Backoff::Exponential;
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(4), Duration::from_millis(800));
    }

    #[test]
    fn test_body_excerpt_is_bounded() {
        let long = "x".repeat(BODY_EXCERPT_LIMIT * 2);
        let cut = excerpt(&long);
        assert!(cut.len() <= BODY_EXCERPT_LIMIT + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("short"), "short");
    }

    #[tokio::test]
    async fn test_call_returns_body_on_first_success() {
        let app = Router::new().route("/job/1/status", get(|| async { r#"{"status":1}"# }));
        let addr = spawn_upstream(app).await;

        let repeater = Repeater::new(quick_policy());
        let body = repeater
            .call(Method::GET, &format!("http://{addr}/job/1/status"), None)
            .await
            .unwrap();
        assert_eq!(body, br#"{"status":1}"#);
    }

    #[tokio::test]
    async fn test_persistent_error_status_exhausts_attempts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        let app = Router::new().route(
            "/job",
            post(move || {
                let counted = counted.clone();
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom")
                }
            }),
        );
        let addr = spawn_upstream(app).await;

        let repeater = Repeater::new(quick_policy());
        let err = repeater
            .call(
                Method::POST,
                &format!("http://{addr}/job"),
                Some(b"{}".to_vec()),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UpstreamError::BadResponse { status: 500, .. }
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // Grab a port nothing is listening on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let repeater = Repeater::new(quick_policy());
        let err = repeater
            .call(Method::GET, &format!("http://{addr}/job/1/status"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::Unreachable { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_reports_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let policy = RetryPolicy {
            max_attempts: 50,
            delay: Duration::from_millis(50),
            backoff: Backoff::Fixed,
            attempt_timeout: Duration::from_secs(1),
            total_timeout: Duration::from_millis(120),
        };
        let started = Instant::now();
        let err = Repeater::new(policy)
            .call(Method::GET, &format!("http://{addr}/ping"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_recovers_when_upstream_heals() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        let app = Router::new().route(
            "/job",
            post(move || {
                let counted = counted.clone();
                async move {
                    if counted.fetch_add(1, Ordering::SeqCst) < 2 {
                        (
                            axum::http::StatusCode::SERVICE_UNAVAILABLE,
                            "warming up".to_string(),
                        )
                    } else {
                        (axum::http::StatusCode::OK, r#"{"id":"1"}"#.to_string())
                    }
                }
            }),
        );
        let addr = spawn_upstream(app).await;

        let repeater = Repeater::new(quick_policy());
        let body = repeater
            .call(
                Method::POST,
                &format!("http://{addr}/job"),
                Some(b"{}".to_vec()),
            )
            .await
            .unwrap();
        assert_eq!(body, br#"{"id":"1"}"#);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
