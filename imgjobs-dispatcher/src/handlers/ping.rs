use axum::response::IntoResponse;

/// GET /ping
/// Liveness probe, no authentication.
pub async fn ping() -> impl IntoResponse {
    "pong\n"
}
