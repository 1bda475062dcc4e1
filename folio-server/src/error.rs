use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use folio_core::ErrorBody;
use thiserror::Error;
use tracing::error;

use crate::AppState;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Server misconfigured: {0}")]
    Misconfigured(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

/// Error text of a 500 response, carried as a response extension until
/// `expose_error_details` decides whether the client may see it.
#[derive(Debug, Clone)]
pub struct InternalDetail(pub String);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Misconfigured(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn status_label(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Error")
}

fn internal_response(detail: String) -> Response {
    let body = ErrorBody::new(
        status_label(StatusCode::INTERNAL_SERVER_ERROR),
        "Something went wrong on our end",
    );
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
    response.extensions_mut().insert(InternalDetail(detail));
    response
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
            return internal_response(self.to_string());
        }

        let body = ErrorBody::new(status_label(status), self.to_string());
        (status, Json(body)).into_response()
    }
}

/// Puts the error text of 500 responses into `details`, except in production.
pub async fn expose_error_details(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let Some(InternalDetail(detail)) = response.extensions_mut().remove::<InternalDetail>() else {
        return response;
    };
    if state.config.is_production() {
        return response;
    }

    let body = ErrorBody::new(
        status_label(response.status()),
        "Something went wrong on our end",
    )
    .with_details(serde_json::Value::String(detail));
    (response.status(), Json(body)).into_response()
}

/// Handler for `CatchPanicLayer`.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "handler panicked");
    internal_response(detail)
}
