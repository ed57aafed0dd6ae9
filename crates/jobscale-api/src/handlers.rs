//! Status handlers.
//!
//! Each handler clones a snapshot out of the [`StatusHandle`] and returns
//! it as JSON.

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use tracing::debug;

use crate::ApiState;

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

/// GET /health
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.status.health_report())
}

/// GET /metrics
pub async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.status.counters())
}

/// Fallback for every other path.
pub async fn not_found(uri: Uri) -> impl IntoResponse {
    debug!(%uri, "unknown status path");
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("no route for {}", uri.path()),
        }),
    )
}
