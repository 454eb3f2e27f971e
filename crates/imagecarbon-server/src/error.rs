//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use imagecarbon_collect::CollectError;
use serde::Serialize;
use thiserror::Error;

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The URL is not a site address.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Bad request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The site refuses automated access.
    #[error("This website does not allow scraping")]
    Forbidden,

    /// An upstream service took too long.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] imagecarbon_storage::StorageError),
}

impl From<CollectError> for ApiError {
    fn from(error: CollectError) -> Self {
        match error {
            CollectError::InvalidUrl(url) => ApiError::InvalidUrl(url),
            CollectError::DiscoveryForbidden => ApiError::Forbidden,
            CollectError::DiscoveryTimeout(after) => {
                ApiError::Timeout(format!("no response from the site after {:?}", after))
            }
            CollectError::Storage(e) => ApiError::Storage(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "invalid_url"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "scraping_forbidden"),
            ApiError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
