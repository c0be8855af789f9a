//! Error types for prato-sync

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::delivery::DeliveryError;

/// Failure of a sync operation (per-record trigger or reconciliation pass)
#[derive(Debug, Error)]
pub enum SyncError {
    /// Downstream delivery failed (non-2xx, network, bad response)
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Reading or writing the record store failed
    #[error(transparent)]
    Write(#[from] prato_common::Error),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Sync pass or trigger failed
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// prato-common error
    #[error(transparent)]
    Common(#[from] prato_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Sync(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SYNC_ERROR",
                err.to_string(),
            ),
            ApiError::Common(prato_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(prato_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": message,
            "code": error_code,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
