//! # Telegram Bot Client
//!
//! Minimal client for the Telegram Bot API.
//!
//! This crate provides:
//! - Client configuration with timeout, user agent and base URL overrides
//! - Plain-text `sendMessage`
//! - Typed errors that never expose the bot token
//!
//! # Examples
//!
//! ```rust,no_run
//! use telegram_bot_client::TelegramClient;
//!
//! # async fn example() -> Result<(), telegram_bot_client::ApiError> {
//! let client = TelegramClient::builder("123456:ABC-DEF").build()?;
//! client.send_message("@my_channel", "hello").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::{
    Chat, ClientConfig, ClientConfigBuilder, Message, SendMessageRequest, TelegramClient,
    TelegramClientBuilder,
};
pub use error::ApiError;
