use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use super::models::ErrorResponse;
use crate::export::ExportError;
use crate::requests::RequestError;
use crate::scraper::ScraperError;
use crate::tasks::TaskError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("X-Harvest-User header is required")]
    Unauthenticated,
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("payload too large: limit is {0} bytes")]
    PayloadTooLarge(u64),
    #[error("permission denied: {0}")]
    Forbidden(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::Forbidden(_) => "PERMISSION_DENIED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(json!(body))).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<TaskError> for ApiError {
    fn from(value: TaskError) -> Self {
        match value {
            TaskError::Unauthenticated => ApiError::Unauthenticated,
            TaskError::PermissionDenied(id) => ApiError::Forbidden(format!("task {id}")),
            TaskError::Store(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ScraperError> for ApiError {
    fn from(value: ScraperError) -> Self {
        match value {
            ScraperError::Validation(err) => ApiError::InvalidPayload(err.to_string()),
            ScraperError::InvalidState { .. } => ApiError::InvalidPayload(value.to_string()),
            ScraperError::Task(err) => err.into(),
            ScraperError::Encode(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(value: ExportError) -> Self {
        match value {
            ExportError::Empty => ApiError::NotFound("no results to export".to_string()),
            ExportError::UnknownFormat(_) => ApiError::InvalidPayload(value.to_string()),
            ExportError::Serialization(_) | ExportError::Storage(_) => {
                ApiError::Internal(value.to_string())
            }
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(value: RequestError) -> Self {
        match value {
            RequestError::Unauthenticated => ApiError::Unauthenticated,
            RequestError::Validation(err) => ApiError::InvalidPayload(err.to_string()),
            RequestError::Storage(_) | RequestError::Store(_) => ApiError::Internal(value.to_string()),
        }
    }
}
