//! Downstream delivery of verified chat messages.
//!
//! The relay hands every extracted [`ChatMessage`] to a [`MessageSink`]. The
//! inbound acknowledgement never depends on the outcome, so sinks report
//! failures only for logging and metrics.

use crate::message::ChatMessage;
use crate::ErrorCategory;
use async_trait::async_trait;
use std::time::Duration;

/// Failure to hand a message to the downstream channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The downstream service refused the message.
    #[error("Downstream rejected the message: {message}")]
    Rejected { message: String },

    /// The downstream service could not be reached or returned a server error.
    #[error("Downstream unavailable: {message}")]
    Unavailable { message: String },

    /// No response within the configured timeout.
    #[error("Downstream request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The downstream service is throttling requests.
    #[error("Downstream rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },
}

impl DeliveryError {
    /// Check if the error is transient and a later attempt may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        if self.is_transient() {
            ErrorCategory::Transient
        } else {
            ErrorCategory::Permanent
        }
    }

    /// Short, stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "rejected",
            Self::Unavailable { .. } => "unavailable",
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
        }
    }
}

/// Destination for verified chat messages.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use wecom_relay_core::{ChatMessage, DeliveryError, MessageSink};
///
/// struct StdoutSink;
///
/// #[async_trait]
/// impl MessageSink for StdoutSink {
///     async fn deliver(&self, message: &ChatMessage) -> Result<(), DeliveryError> {
///         println!("{}", message.notification_text());
///         Ok(())
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let sink = StdoutSink;
/// sink.deliver(&ChatMessage::text("alice", "hello")).await.unwrap();
/// # });
/// ```
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one message to the downstream channel.
    async fn deliver(&self, message: &ChatMessage) -> Result<(), DeliveryError>;
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
