//! Production [`MessageSink`] delivering relayed messages to a Telegram chat.

use async_trait::async_trait;
use std::time::Duration;
use telegram_bot_client::{ApiError, ClientConfig, TelegramClient};
use tracing::{debug, instrument};
use wecom_relay_api::TelegramConfig;
use wecom_relay_core::{ChatMessage, DeliveryError, MessageSink};

// ============================================================================
// TelegramSink
// ============================================================================

/// Sends each message's notification text to one Telegram chat.
///
/// Text is sent without a parse mode, so message content is never
/// interpreted as markup.
#[derive(Debug, Clone)]
pub struct TelegramSink {
    client: TelegramClient,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(client: TelegramClient, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            chat_id: chat_id.into(),
        }
    }

    /// Build the sink and its HTTP client from service configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] if the client cannot be built.
    pub fn from_config(config: &TelegramConfig) -> Result<Self, ApiError> {
        let client_config = ClientConfig::builder()
            .api_base_url(config.api_base_url.clone())
            .timeout(config.timeout())
            .user_agent(format!("wecom-relay/{}", env!("CARGO_PKG_VERSION")))
            .build();

        let client = TelegramClient::builder(config.bot_token.clone())
            .config(client_config)
            .build()?;

        Ok(Self::new(client, config.chat_id.clone()))
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    #[instrument(skip(self, message), fields(sender = %message.sender))]
    async fn deliver(&self, message: &ChatMessage) -> Result<(), DeliveryError> {
        let sent = self
            .client
            .send_message(&self.chat_id, &message.notification_text())
            .await
            .map_err(|e| delivery_error(e, self.client.config().timeout))?;

        debug!(message_id = sent.message_id, "Delivered to Telegram");
        Ok(())
    }
}

/// Map a Bot API failure onto the relay's delivery error.
fn delivery_error(error: ApiError, timeout: Duration) -> DeliveryError {
    match error {
        ApiError::Timeout => DeliveryError::Timeout { timeout },
        ApiError::RateLimited { retry_after } => DeliveryError::RateLimited { retry_after },
        other if other.is_transient() => DeliveryError::Unavailable {
            message: other.to_string(),
        },
        other => DeliveryError::Rejected {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
