//! Configuration types for the relay service
//!
//! Every section carries serde defaults so a partially specified file (or
//! environment-only configuration) deserializes cleanly. Secrets have no
//! usable default; [`ServiceConfig::validate`] rejects them when empty.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use wecom_relay_core::AesKey;

/// Routes the relay always serves; the callback endpoint may not shadow them.
const RESERVED_PATHS: &[&str] = &["/health", "/metrics"];

/// Characters the router treats as captures, wildcards or query syntax.
const ROUTE_SYNTAX_CHARS: &[char] = &[':', '*', '{', '}', '?', '#'];

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// WeCom callback integration
    pub wecom: WecomConfig,

    /// Telegram delivery target
    pub telegram: TelegramConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check the configuration for values the service cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.wecom.validate()?;
        self.telegram.validate()?;
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Enable permissive CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 10,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
            enable_cors: false,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "server.host".to_string(),
            });
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "server.timeout_seconds must be greater than zero".to_string(),
            });
        }
        if self.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// WeCom callback configuration, as shown in the WeCom admin console
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WecomConfig {
    /// Path serving both the verification GET and the message POST
    pub endpoint_path: String,

    /// Shared signing token
    pub token: String,

    /// 43-character EncodingAESKey
    pub encoding_aes_key: String,

    /// Corp id every decrypted frame must be addressed to
    pub corp_id: String,
}

impl Default for WecomConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/wecom".to_string(),
            token: String::new(),
            encoding_aes_key: String::new(),
            corp_id: String::new(),
        }
    }
}

impl WecomConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.endpoint_path.starts_with('/') || self.endpoint_path.len() < 2 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "wecom.endpoint_path must be an absolute path other than '/', got '{}'",
                    self.endpoint_path
                ),
            });
        }
        if let Some(c) = self
            .endpoint_path
            .chars()
            .find(|c| ROUTE_SYNTAX_CHARS.contains(c) || c.is_whitespace())
        {
            return Err(ConfigError::Invalid {
                message: format!(
                    "wecom.endpoint_path must be a literal path, found '{}' in '{}'",
                    c, self.endpoint_path
                ),
            });
        }
        if RESERVED_PATHS.contains(&self.endpoint_path.as_str()) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "wecom.endpoint_path '{}' is reserved",
                    self.endpoint_path
                ),
            });
        }

        require_non_empty("wecom.token", &self.token)?;
        require_non_empty("wecom.encoding_aes_key", &self.encoding_aes_key)?;
        require_non_empty("wecom.corp_id", &self.corp_id)?;

        AesKey::from_encoding_key(&self.encoding_aes_key)?;
        Ok(())
    }
}

// Security: Don't expose secrets in debug output
impl std::fmt::Debug for WecomConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WecomConfig")
            .field("endpoint_path", &self.endpoint_path)
            .field("token", &"<REDACTED>")
            .field("encoding_aes_key", &"<REDACTED>")
            .field("corp_id", &self.corp_id)
            .finish()
    }
}

/// Telegram delivery configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token
    pub bot_token: String,

    /// Numeric chat id or `@channelusername`
    pub chat_id: String,

    /// Bot API base URL
    pub api_base_url: String,

    /// Outbound request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base_url: "https://api.telegram.org".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl TelegramConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("telegram.bot_token", &self.bot_token)?;
        require_non_empty("telegram.chat_id", &self.chat_id)?;
        require_non_empty("telegram.api_base_url", &self.api_base_url)?;

        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "telegram.timeout_seconds must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

// Security: Don't expose secrets in debug output
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<REDACTED>")
            .field("chat_id", &self.chat_id)
            .field("api_base_url", &self.api_base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

fn require_non_empty(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing {
            key: key.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
