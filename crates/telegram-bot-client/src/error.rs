//! Error types for Telegram Bot API operations.
//!
//! The bot token is part of every request URL. None of these errors carry
//! that URL, so their Display output is safe to log.

use std::time::Duration;
use thiserror::Error;

/// Errors during Telegram Bot API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API answered with `ok: false`.
    #[error("Telegram API error {error_code}: {description}")]
    Rejected { error_code: u16, description: String },

    /// Too many requests; Telegram may say how long to wait.
    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Non-success HTTP status without a Bot API error body.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Request to the Bot API timed out.
    #[error("Request timeout")]
    Timeout,

    /// The response body was not a valid Bot API response.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// Network or TLS failure before a response was received.
    #[error("Transport error: {0}")]
    Transport(reqwest::Error),

    /// The client could not be configured.
    #[error("Client configuration error: {message}")]
    Configuration { message: String },
}

impl ApiError {
    /// Map a transport error, stripping the request URL because it embeds
    /// the bot token.
    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error.without_url())
        }
    }

    /// Check if this error represents a transient condition that may succeed if retried.
    ///
    /// Transient conditions include:
    /// - Server errors (5xx)
    /// - Rate limiting (429)
    /// - Request timeouts
    /// - Network/transport errors
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Rejected { error_code, .. } => *error_code >= 500,
            Self::RateLimited { .. } => true,
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout => true,
            Self::InvalidResponse { .. } => false,
            Self::Transport(_) => true,
            Self::Configuration { .. } => false,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
