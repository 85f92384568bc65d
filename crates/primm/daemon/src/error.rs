//! Error types for primm-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use primm_progress::ProgressError;
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Storage error: {0}")]
    Storage(#[from] primm_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stage definition cannot be graded
    #[error("Invalid stage: {0}")]
    InvalidStage(String),

    /// Carries a message that is safe to return to clients
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ProgressError> for ApiError {
    fn from(err: ProgressError) -> Self {
        match &err {
            ProgressError::NotFound(msg) => ApiError::NotFound(msg.clone()),
            ProgressError::Conflict(msg) => ApiError::Conflict(msg.clone()),
            ProgressError::InvalidStage(detail) => {
                tracing::warn!(error = %detail, "Stage cannot be graded");
                ApiError::InvalidStage(err.user_message())
            }
            ProgressError::Execution(_) | ProgressError::Storage { .. } => {
                tracing::error!(error = %err, "Request failed");
                ApiError::Internal(err.user_message())
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::InvalidStage(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STAGE", msg)
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
