use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json
};
use thiserror::Error;
use tracing::error;

use crate::models::InvalidQuestion;

/// Errors returned by HTTP handlers, rendered as `{"error": message}`
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden")]
    Forbidden,
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Database(err) => {
                error!(error = %err, "request failed with an internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            ApiError::InvalidState(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Admin privileges required".to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Errors raised by the session ledger
#[derive(Error, Debug)]
pub enum StudyError {
    /// The session or question does not exist, or belongs to someone else
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The session can no longer accept the operation
    #[error("{0}")]
    InvalidState(String),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
    #[error(transparent)]
    Pool(#[from] diesel::r2d2::PoolError),
}

impl From<StudyError> for ApiError {
    fn from(err: StudyError) -> Self {
        match err {
            StudyError::NotFound(what) => ApiError::NotFound(what.to_string()),
            StudyError::InvalidState(reason) => ApiError::InvalidState(reason),
            StudyError::Database(e) => ApiError::Database(e.into()),
            StudyError::Pool(e) => ApiError::Database(e.into()),
        }
    }
}

impl From<InvalidQuestion> for ApiError {
    fn from(err: InvalidQuestion) -> Self {
        ApiError::Validation(err.to_string())
    }
}
