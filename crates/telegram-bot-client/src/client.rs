//! Telegram Bot API client.
//!
//! Only the operations the relay needs are implemented. Every request goes to
//! `{api_base_url}/bot{token}/{method}` and every response is the standard
//! Bot API envelope `{ ok, result, description, error_code, parameters }`.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::error::ApiError;

/// Configuration for Telegram API client behavior.
///
/// # Examples
///
/// ```
/// use telegram_bot_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(5))
///     .with_api_base_url("http://localhost:8081");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent string for API requests
    pub user_agent: String,
    /// Request timeout duration
    pub timeout: Duration,
    /// Bot API base URL
    pub api_base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("telegram-bot-client/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(10),
            api_base_url: "https://api.telegram.org".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for client configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the Bot API base URL.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Builder for constructing `ClientConfig` instances.
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new configuration builder with defaults.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the Bot API base URL.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Standard Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

impl<T> ApiResponse<T> {
    fn into_error(self, status: reqwest::StatusCode) -> ApiError {
        let error_code = self.error_code.unwrap_or_else(|| status.as_u16());
        if error_code == 429 {
            return ApiError::RateLimited {
                retry_after: self
                    .parameters
                    .and_then(|p| p.retry_after)
                    .map(Duration::from_secs),
            };
        }

        ApiError::Rejected {
            error_code,
            description: self.description.unwrap_or_default(),
        }
    }
}

/// Body of a `sendMessage` call.
///
/// No `parse_mode` is sent, so the text is always delivered verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_notification: Option<bool>,
}

/// Chat a message was sent to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Message returned by a successful `sendMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub date: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// Telegram Bot API client.
///
/// # Examples
///
/// ```no_run
/// # use telegram_bot_client::{ClientConfig, TelegramClient};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = TelegramClient::builder("123456:ABC-DEF")
///     .config(ClientConfig::default())
///     .build()?;
///
/// let message = client.send_message("-100123456", "hello").await?;
/// println!("Sent message {}", message.message_id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TelegramClient {
    bot_token: String,
    http_client: reqwest::Client,
    config: ClientConfig,
    api_base: String,
}

impl TelegramClient {
    /// Create a new builder for constructing a Telegram client.
    pub fn builder(bot_token: impl Into<String>) -> TelegramClientBuilder {
        TelegramClientBuilder::new(bot_token)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a plain-text message to a chat.
    ///
    /// `chat_id` is either a numeric chat id or an `@channelusername`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if:
    /// - the HTTP request fails or times out
    /// - the Bot API answers with `ok: false`
    /// - the response cannot be parsed
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<Message, ApiError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            disable_notification: None,
        };
        let message: Message = self.call("sendMessage", &request).await?;

        debug!(message_id = message.message_id, "Telegram message sent");
        Ok(message)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{}", self.api_base, self.bot_token, method);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(ApiError::from_transport)?;

        match serde_json::from_slice::<ApiResponse<T>>(&bytes) {
            Ok(envelope) if envelope.ok => {
                envelope.result.ok_or_else(|| ApiError::InvalidResponse {
                    message: format!("{} response has no result", method),
                })
            }
            Ok(envelope) => Err(envelope.into_error(status)),
            Err(e) if status.is_success() => Err(ApiError::InvalidResponse {
                message: format!("Failed to parse {} response: {}", method, e),
            }),
            Err(_) => Err(ApiError::HttpError {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            }),
        }
    }
}

// Security: Don't expose the bot token in debug output
impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("bot_token", &"<REDACTED>")
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for constructing `TelegramClient` instances.
pub struct TelegramClientBuilder {
    bot_token: String,
    config: Option<ClientConfig>,
}

impl TelegramClientBuilder {
    fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            config: None,
        }
    }

    /// Set the client configuration.
    ///
    /// If not set, uses `ClientConfig::default()`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the Telegram client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Configuration` if the token is empty, the base URL
    /// is not an absolute http(s) URL, or the HTTP client cannot be created.
    pub fn build(self) -> Result<TelegramClient, ApiError> {
        let config = self.config.unwrap_or_default();

        if self.bot_token.trim().is_empty() {
            return Err(ApiError::Configuration {
                message: "Bot token must not be empty".to_string(),
            });
        }

        let base = Url::parse(&config.api_base_url).map_err(|e| ApiError::Configuration {
            message: format!("Invalid API base URL: {}", e),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::Configuration {
                message: format!("Unsupported API base URL scheme: {}", base.scheme()),
            });
        }

        // Build reqwest client with timeout and user agent
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ApiError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(TelegramClient {
            bot_token: self.bot_token,
            http_client,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            config,
        })
    }
}

// Security: Don't expose the bot token in debug output
impl std::fmt::Debug for TelegramClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClientBuilder")
            .field("bot_token", &"<REDACTED>")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
