//! HTTP error mapping
//!
//! Store and repository errors carry an `ErrorKind`; the status code comes
//! from `status_for`, never from inspecting concrete error types.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::{ErrorKind, RuleDbError};

/// Status code for each error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Decode | ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::LockTimeout | ErrorKind::Closed => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] RuleDbError),

    #[error(transparent)]
    Body(#[from] JsonRejection),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Store(e) => {
                let status = status_for(e.kind());
                if status.is_server_error() {
                    tracing::error!("HTTP {} - {}", status.as_u16(), e);
                } else {
                    tracing::debug!("HTTP {} - {}", status.as_u16(), e);
                }
                match e.kind() {
                    ErrorKind::Io => (status, "internal storage error".to_string()),
                    _ => (status, e.to_string()),
                }
            }
            ApiError::Body(rejection) => {
                tracing::debug!("HTTP {} - {}", rejection.status().as_u16(), rejection.body_text());
                (rejection.status(), rejection.body_text())
            }
            ApiError::Worker(e) => {
                tracing::error!("HTTP 500 - {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    StatusCode::INTERNAL_SERVER_ERROR.to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
