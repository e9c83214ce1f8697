use crate::observability::metrics::record_error;
use crate::observability::ErrorCategory;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Username already taken")]
    UsernameTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account not found")]
    NotFound,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    #[error("URL not allowed: {0}")]
    NotAllowed(String),

    #[error("Outbound request timed out")]
    Timeout,

    #[error("Outbound request failed: {0}")]
    TransportFailure(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AccountError::UsernameTaken => (
                StatusCode::CONFLICT,
                "USERNAME_TAKEN",
                "Username already exists".to_string(),
            ),
            AccountError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            AccountError::NotFound => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "User not found".to_string(),
            ),
            AccountError::InvalidRequest(reason) => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", reason.clone())
            }
            AccountError::MalformedUrl(reason) => (
                StatusCode::BAD_REQUEST,
                "MALFORMED_URL",
                format!("Malformed URL: {}", reason),
            ),
            AccountError::NotAllowed(reason) => (
                StatusCode::FORBIDDEN,
                "NOT_ALLOWED",
                format!("URL not allowed: {}", reason),
            ),
            AccountError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT",
                "Outbound request timed out".to_string(),
            ),
            // Transport details stay server-side.
            AccountError::TransportFailure(_) => (
                StatusCode::BAD_GATEWAY,
                "TRANSPORT_FAILURE",
                "Outbound request failed".to_string(),
            ),
            AccountError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "An internal database error occurred".to_string(),
            ),
            AccountError::Crypto(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CRYPTO_ERROR",
                "An internal cryptographic error occurred".to_string(),
            ),
            AccountError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(target: "account.errors", error = %self, code, "Request failed");
        }
        record_error(ErrorCategory::from(&self).as_str(), status.as_u16());

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
