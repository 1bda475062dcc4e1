use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use folio_core::{now_timestamp, HealthResponse};

use crate::AppState;

/// Handler for GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (status, label) = if state.db.health().await {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE")
    };

    let body = HealthResponse {
        status: label.to_string(),
        timestamp: now_timestamp(),
        uptime: state.started_at.elapsed().as_secs_f64(),
    };
    (status, Json(body))
}
