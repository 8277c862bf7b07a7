use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::dataset::DatasetError;
use crate::forecast::ForecastError;
use crate::storage::StorageError;

/// API error types that can be returned from handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Unprocessable data: {0}")]
    Unprocessable(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error response that gets serialized to JSON
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationError(_) | ApiError::Unprocessable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::StorageError(_) | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error type string
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::ValidationError(_) => "ValidationError",
            ApiError::UnsupportedMediaType(_) => "UnsupportedMediaType",
            ApiError::Unprocessable(_) => "UnprocessableData",
            ApiError::PayloadTooLarge(_) => "PayloadTooLarge",
            ApiError::StorageError(_) => "StorageError",
            ApiError::InternalError(_) => "InternalServerError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        let message = match &self {
            ApiError::StorageError(_) | ApiError::InternalError(_) => {
                tracing::error!(error = %self, "API error occurred");
                "An internal error occurred".to_string()
            }
            _ => {
                tracing::debug!(error = %self, "Client error");
                self.to_string()
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(error_response)).into_response()
    }
}

// Conversion from module error types

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{error:#}"))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}

impl From<DatasetError> for ApiError {
    fn from(error: DatasetError) -> Self {
        ApiError::Unprocessable(error.to_string())
    }
}

impl From<ForecastError> for ApiError {
    fn from(error: ForecastError) -> Self {
        match error {
            ForecastError::Model(_) => ApiError::InternalError(error.to_string()),
            ForecastError::InsufficientData { .. }
            | ForecastError::Dataset(_)
            | ForecastError::Metrics(_) => ApiError::Unprocessable(error.to_string()),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(error: AnalysisError) -> Self {
        ApiError::ValidationError(error.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        ApiError::StorageError(error.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(error.body_text())
        } else {
            ApiError::BadRequest(error.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Unprocessable(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(error: tokio::task::JoinError) -> Self {
        ApiError::InternalError(format!("background task failed: {error}"))
    }
}
