use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use imgjobs_auth::Claims;
use imgjobs_registry::{Job, JobStatus};

use crate::{error::ApiError, integrity, state::AppState};

/// POST /api/v1/job
/// Validate a submission, dispatch it to the worker service and register it.
pub async fn submit_job(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let envelope: integrity::SubmissionEnvelope =
        serde_json::from_slice(&body).map_err(|e| ApiError::malformed_body(e.to_string()))?;

    integrity::verify(&envelope)?;

    let claims = authorize(&state, &headers)?;

    let mut draft = Job::draft(
        claims.tenant_id.unwrap_or_default(),
        claims.client_id.unwrap_or_default(),
        envelope.content,
    );

    let ack = state.engine.submit_job(&draft).await?;
    if ack.payload_location.is_some() {
        draft.payload_location = ack.payload_location;
    }

    let job = state.registry.create(draft).await;
    if !ack.id.is_empty() && ack.id != job.id {
        // Registry ids are authoritative; a disagreement means the worker's
        // store and ours have drifted.
        warn!(job_id = %job.id, worker_id = %ack.id, "worker acknowledged a different job id");
    }
    info!(job_id = %job.id, tenant_id = job.tenant_id, "job dispatched");

    Ok((StatusCode::CREATED, Json(json!({ "id": job.id }))))
}

/// GET /api/v1/job/{id}/status
/// Query the worker service for the current status of a job.
///
/// An upstream failure degrades to UNKNOWN instead of failing the request;
/// the caller still learns the job exists from its own point of view.
pub async fn job_status(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;

    let status = match state.engine.job_status(&id).await {
        Ok(status) => status,
        Err(e) => {
            warn!(job_id = %id, error = %e, "status query failed, reporting UNKNOWN");
            JobStatus::Unknown
        }
    };

    Ok(Json(json!({ "status": status })))
}

/// GET /api/v1/job/{id}
/// Return the stored job overlaid with a freshly fetched status.
///
/// A successful fetch is written back to the registry; a failed fetch
/// overlays UNKNOWN on the response only and leaves the stored record alone.
pub async fn get_job(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    authorize(&state, &headers)?;

    let mut job = state.registry.get(&id).await?;

    match state.engine.job_status(&id).await {
        Ok(status) => {
            job = state.registry.refresh_status(&id, status).await?;
        }
        Err(e) => {
            warn!(job_id = %id, error = %e, "status refresh failed, overlaying UNKNOWN");
            job.status = JobStatus::Unknown;
        }
    }

    Ok(Json(job))
}

/// Verify the Authorization header against the configured verifier.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    state.verifier.verify(credential).map_err(|e| {
        debug!(error = %e, header_present = !credential.is_empty(), "authentication failed");
        ApiError::Authentication(e)
    })
}
