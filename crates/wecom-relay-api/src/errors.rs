//! Error types for the HTTP service

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};
use wecom_relay_core::{CallbackError, KeyError};

/// Callback handler errors with HTTP status code mapping
///
/// Only the URL verification endpoint surfaces these to the caller. The
/// message endpoint acknowledges every request that reached the protocol.
///
/// - `400 Bad Request`: missing or unparseable query parameters, or a
///   callback that could not be decrypted or parsed
/// - `403 Forbidden`: signature mismatch
///
/// # Security Considerations
///
/// Response bodies are fixed strings. The underlying error is logged
/// server-side with the request's correlation ID.
#[derive(Debug, thiserror::Error)]
pub enum CallbackHandlerError {
    /// A required query parameter is missing or malformed
    ///
    /// Maps to: `400 Bad Request`
    #[error("Invalid query parameters: {0}")]
    InvalidQuery(#[from] QueryRejection),

    /// The callback failed authentication, decryption or parsing
    ///
    /// Maps to:
    /// - `403 Forbidden` for [`CallbackError::AuthenticationFailed`]
    /// - `400 Bad Request` otherwise
    #[error("Callback rejected: {0}")]
    Rejected(#[from] CallbackError),
}

impl CallbackHandlerError {
    /// HTTP status returned for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::Rejected(CallbackError::AuthenticationFailed) => StatusCode::FORBIDDEN,
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for CallbackHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            Self::InvalidQuery(e) => {
                info!(error = %e, "Callback request missing query parameters");
            }
            Self::Rejected(e) if e.is_security_relevant() => {
                warn!(error = %e, kind = e.kind(), "Callback rejected");
            }
            Self::Rejected(e) => {
                info!(error = %e, kind = e.kind(), "Callback rejected");
            }
        }

        let body = match status {
            StatusCode::FORBIDDEN => "Forbidden",
            _ => "Bad Request",
        };

        (status, body).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Invalid WeCom encoding AES key: {0}")]
    InvalidKey(#[from] KeyError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
