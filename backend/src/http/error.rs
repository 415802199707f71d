use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::dto::ErrorResponse;

/// Request-level failure, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn missing_parameter(param: &str) -> Self {
        Self::bad_request(format!("Mandatory parameter '{}' was not sent", param))
    }

    pub fn invalid_parameter(param: &str, reason: &str) -> Self {
        Self::bad_request(format!("Illegal parameter '{}': {}", param, reason))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API Error {}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}
