//! Error types shared across the pipeline.
//!
//! Each seam gets its own enum so callers can tell a missing row from a
//! failed query and a clean stream end from a transport fault.
//! [`ApiError`] is the only one that knows about HTTP.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

// ---

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Failed to open stream: {0}")]
    Connect(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Stream closed by peer")]
    Closed,

    #[error("Stream ended before acknowledgment")]
    MissingAck,

    #[error("Frame codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StreamError {
    /// The session can carry nothing more; the only remedy is a new one.
    pub const fn is_session_lost(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Reading {0} not found")]
    NotFound(i64),

    #[error("At least one filter condition is required for deletion")]
    EmptyDeleteFilter,

    #[error("Invalid reading: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid id2 format")]
    Id2Format,

    #[error("id2 must be between 0 and 999")]
    Id2Range,

    #[error("invalid from date format")]
    FromFormat,

    #[error("invalid to date format")]
    ToFormat,
}

/// Errors surfaced by the HTTP boundaries as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden - {0} access required")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(String),

    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::NotFound(_) => Self::NotFound("reading not found".to_string()),
            QueryError::EmptyDeleteFilter | QueryError::Invalid(_) => {
                Self::BadRequest(err.to_string())
            }
            QueryError::Storage(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        tracing::debug!("Rejected body: {}", err.body_text());
        Self::BadRequest("invalid request body".to_string())
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        Self::BadRequest("invalid id format".to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        Self::BadRequest(err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status_code();

        // Storage details stay in the log
        if let Self::Internal(detail) = &self {
            tracing::error!("Request failed: {}", detail);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
