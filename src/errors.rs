//! Structured error handling with machine-readable codes
//!
//! Every API error maps to a code, an HTTP status, and a client-safe
//! message. Upstream failures (storage, fetching) are logged with full
//! detail server-side and surfaced to the caller as a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error response for API clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,
}

/// Application error types with proper categorization
#[derive(Debug)]
pub enum AppError {
    // Validation errors (400)
    InvalidInput { field: String, reason: String },
    JobNotCompleted { status: String },

    // Payload limit (413)
    PayloadTooLarge { size: u64, max: u64 },

    // Not found (404)
    JobNotFound(String),
    SyncNotFound(String),
    NodeNotFound(String),

    // Conflict (409)
    BuildInProgress(String),

    // Internal errors (500) — detail stays server-side
    StorageError(String),
    SerializationError(String),
    UpstreamError(String),

    // Generic wrapper for external errors
    Internal(anyhow::Error),
}

impl AppError {
    /// Get error code for client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::JobNotCompleted { .. } => "JOB_NOT_COMPLETED",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::JobNotFound(_) => "JOB_NOT_FOUND",
            Self::SyncNotFound(_) => "SYNC_NOT_FOUND",
            Self::NodeNotFound(_) => "NODE_NOT_FOUND",
            Self::BuildInProgress(_) => "BUILD_IN_PROGRESS",
            Self::StorageError(_) => "STORAGE_ERROR",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::UpstreamError(_) => "UPSTREAM_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } | Self::JobNotCompleted { .. } => StatusCode::BAD_REQUEST,

            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            Self::JobNotFound(_) | Self::SyncNotFound(_) | Self::NodeNotFound(_) => {
                StatusCode::NOT_FOUND
            }

            Self::BuildInProgress(_) => StatusCode::CONFLICT,

            Self::StorageError(_)
            | Self::SerializationError(_)
            | Self::UpstreamError(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Internal variants return a generic string;
    /// the detail is logged, not leaked.
    pub fn message(&self) -> String {
        match self {
            Self::InvalidInput { field, reason } => {
                format!("Invalid input for field '{field}': {reason}")
            }
            Self::JobNotCompleted { status } => {
                format!("Ingest job status is {status}, expected completed")
            }
            Self::PayloadTooLarge { size, max } => {
                format!("Total payload too large: {size} bytes exceeds limit of {max} bytes")
            }
            Self::JobNotFound(id) => format!("Ingest job not found: {id}"),
            Self::SyncNotFound(id) => format!("Graph sync record not found: {id}"),
            Self::NodeNotFound(id) => format!("Node not found: {id}"),
            Self::BuildInProgress(job_id) => {
                format!("A graph build is already running for job {job_id}")
            }
            Self::StorageError(_)
            | Self::SerializationError(_)
            | Self::UpstreamError(_)
            | Self::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Full detail for server-side logs.
    fn detail(&self) -> String {
        match self {
            Self::StorageError(msg) => format!("Storage error: {msg}"),
            Self::SerializationError(msg) => format!("Serialization error: {msg}"),
            Self::UpstreamError(msg) => format!("Upstream error: {msg}"),
            Self::Internal(err) => format!("Internal error: {err:#}"),
            other => other.message(),
        }
    }

    /// Convert to structured error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.message(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.detail())
    }
}

impl std::error::Error for AppError {}

/// Convert from anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

/// Axum IntoResponse implementation for proper HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(code = self.code(), "{}", self.detail());
        }
        let body = self.to_response();

        (status, Json(body)).into_response()
    }
}

/// Helper trait to convert validation errors
pub trait ValidationErrorExt<T> {
    fn map_validation_err(self, field: &str) -> Result<T>;
}

impl<T> ValidationErrorExt<T> for anyhow::Result<T> {
    fn map_validation_err(self, field: &str) -> Result<T> {
        self.map_err(|e| AppError::InvalidInput {
            field: field.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::JobNotFound("abc".to_string()).code(),
            "JOB_NOT_FOUND"
        );
        assert_eq!(
            AppError::BuildInProgress("abc".to_string()).code(),
            "BUILD_IN_PROGRESS"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::InvalidInput {
                field: "question".to_string(),
                reason: "empty".to_string()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::PayloadTooLarge { size: 10, max: 1 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::SyncNotFound("123".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::StorageError("failed".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        let err = AppError::StorageError("rocksdb: io error".to_string());
        assert_eq!(err.message(), "Internal server error");
        assert!(err.to_string().contains("rocksdb"));
    }
}
