/// Unified error types for ClassReel
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the publication and engagement pipeline
#[derive(Error, Debug)]
pub enum ReelError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing or invalid bearer token
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Actor lacks the role or ownership the operation needs
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Missing or invalid input fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Target row does not exist (or was consumed by a concurrent decision)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Blob store or identity provider unreachable
    #[error("Dependency unavailable: {0}")]
    Dependency(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// A call did not resolve before the client deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReelError {
    /// Whether a client may simply try the same call again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReelError::Dependency(_)
                | ReelError::Timeout(_)
                | ReelError::RateLimitExceeded { .. }
                | ReelError::Database(_)
        )
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ReelError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ReelError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            ReelError::Unauthorized(_) => (StatusCode::FORBIDDEN, "Forbidden", self.to_string()),
            ReelError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            ReelError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            ReelError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            ReelError::Dependency(_) | ReelError::Timeout(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "TryAgain",
                "A dependency is unavailable, please try again".to_string(),
            ),
            ReelError::Database(_) | ReelError::Internal(_) | ReelError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for pipeline operations
pub type ReelResult<T> = Result<T, ReelError>;
