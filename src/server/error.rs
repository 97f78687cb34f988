//! API error type and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::SerplensError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SerplensError> for ApiError {
    fn from(err: SerplensError) -> Self {
        match err {
            // Caller mistakes: reject with the full message
            SerplensError::InvalidModelKind(_)
            | SerplensError::MalformedColumn { .. }
            | SerplensError::EmptyDataset
            | SerplensError::InsufficientData { .. }
            | SerplensError::InvalidEmail(_)
            | SerplensError::DataError(_) => ApiError::BadRequest(err.to_string()),

            SerplensError::WebhookError(msg) => ApiError::Upstream(msg),

            // Everything else is on us
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Upstream(msg) => {
                tracing::warn!(detail = %msg, "upstream request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Login service unavailable. Try again.".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(detail = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
