use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use folio_core::{HistoryQuery, HistoryResponse, PerformanceSummary, SnapshotResponse};

use crate::{auth::AuthUser, error::AppError, extract::ApiQuery, portfolio, AppState};

const DEFAULT_HISTORY_LIMIT: u32 = 30;
const MAX_HISTORY_LIMIT: u32 = 365;

/// Handler for GET /api/performance/summary
pub async fn summary(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<PerformanceSummary>, AppError> {
    let summary = portfolio::summarize(&state.db, user.id, &user.base_currency).await?;
    Ok(Json(summary))
}

/// Handler for POST /api/performance/snapshots
pub async fn create_snapshot(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<(StatusCode, Json<SnapshotResponse>), AppError> {
    let snapshot = portfolio::record_snapshot(&state.db, user.id, &user.base_currency).await?;
    Ok((StatusCode::CREATED, Json(SnapshotResponse { snapshot })))
}

/// Handler for GET /api/performance/history?limit=
pub async fn history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let snapshots = portfolio::snapshot_history(&state.db, user.id, limit).await?;
    Ok(Json(HistoryResponse { snapshots }))
}
