//! Error types for scout-research
//!
//! Every error body has the shape
//! `{"error": {"code", "category", "message", "retryable", "fields"?}}`.

use crate::models::ValidationError;
use crate::services::{AlreadyRunning, SearchError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scout_common::events::ErrorCategory;
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request failed validation (400)
    #[error("Validation failed: {0}")]
    Validation(ValidationError),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409), e.g. search already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// scout-common error
    #[error("Common error: {0}")]
    Common(#[from] scout_common::Error),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<AlreadyRunning> for ApiError {
    fn from(err: AlreadyRunning) -> Self {
        ApiError::Conflict(err.to_string())
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::AlreadyRunning(e) => e.into(),
            SearchError::Persistence(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, category, message, fields) = match self {
            ApiError::Validation(err) => {
                let fields = serde_json::to_value(&err.fields).ok();
                (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    ErrorCategory::Validation,
                    err.to_string(),
                    fields,
                )
            }
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                ErrorCategory::Validation,
                msg,
                None,
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                ErrorCategory::Validation,
                msg,
                None,
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                ErrorCategory::Validation,
                msg,
                None,
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                ErrorCategory::Internal,
                msg,
                None,
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                ErrorCategory::Internal,
                err.to_string(),
                None,
            ),
        };

        let mut error = json!({
            "code": error_code,
            "category": category,
            "message": message,
            "retryable": category.is_retryable(),
        });
        if let Some(fields) = fields {
            error["fields"] = fields;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
