pub mod accounts;
pub mod auth;
pub mod currencies;
pub mod health;
pub mod performance;
pub mod two_factor;

use axum::extract::OriginalUri;

use crate::error::AppError;

/// Fallback for unmatched `/api/*` paths.
pub async fn api_not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("No API route for {}", uri.path()))
}
