use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

// Submission bodies carry base64 image payloads; 3 MB matches the original
// gateway limit.
const SIZE_BODY_LIMIT: usize = 3 * 1024 * 1024;

/// Per-request bound, independent of the engine's own retry budget.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the primary axum router with the provided shared application state.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST])
        .allow_headers(vec![
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            HeaderName::from_static("x-xsrf-token"),
        ])
        .expose_headers(vec![header::AUTHORIZATION])
        .max_age(Duration::from_secs(300));

    let api = Router::new()
        .route("/job", post(handlers::jobs::submit_job))
        .route("/job/{id}/status", get(handlers::jobs::job_status))
        .route("/job/{id}", get(handlers::jobs::get_job))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(DefaultBodyLimit::max(SIZE_BODY_LIMIT));

    Router::new()
        .route("/ping", get(handlers::ping::ping))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}
