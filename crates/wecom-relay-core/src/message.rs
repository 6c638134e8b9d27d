//! Chat message extraction from decrypted callback payloads.

use crate::{xml, CallbackResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const FROM_USER_TAG: &str = "FromUserName";
const CONTENT_TAG: &str = "Content";
const MSG_TYPE_TAG: &str = "MsgType";

/// Message kinds the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
}

impl MessageKind {
    /// Wire name used in the `MsgType` element
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = UnsupportedKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            other => Err(UnsupportedKind(other.to_string())),
        }
    }
}

/// A `MsgType` the relay does not forward.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported message kind: {0}")]
pub struct UnsupportedKind(pub String);

/// A chat message extracted from a verified callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    pub kind: MessageKind,
}

impl ChatMessage {
    /// Create a new text message
    pub fn text(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            kind: MessageKind::Text,
        }
    }

    /// Plain-text notification forwarded downstream.
    pub fn notification_text(&self) -> String {
        format!("From WeCom ({}):\n{}", self.sender, self.content)
    }
}

/// Extract a chat message from a decrypted payload.
///
/// Returns `Ok(None)` when the message is not a text message or when any of
/// the sender, content or kind elements is missing. Unsupported kinds are
/// dropped rather than reported as errors.
///
/// # Errors
///
/// Returns [`CallbackError::MalformedPayload`](crate::CallbackError::MalformedPayload)
/// if the payload is not well-formed or one of the three elements occurs
/// more than once.
///
/// # Examples
///
/// ```rust
/// use wecom_relay_core::message::extract;
///
/// let xml = "<xml><FromUserName><![CDATA[alice]]></FromUserName>\
///            <Content><![CDATA[hello]]></Content>\
///            <MsgType><![CDATA[text]]></MsgType></xml>";
/// let message = extract(xml).unwrap().unwrap();
/// assert_eq!(message.sender, "alice");
/// ```
pub fn extract(payload: &str) -> CallbackResult<Option<ChatMessage>> {
    let mut fields = xml::read_fields(payload, &[FROM_USER_TAG, CONTENT_TAG, MSG_TYPE_TAG])?;

    let kind = match fields.get(MSG_TYPE_TAG).map(|s| s.parse::<MessageKind>()) {
        Some(Ok(kind)) => kind,
        _ => return Ok(None),
    };

    let (Some(sender), Some(content)) = (fields.remove(FROM_USER_TAG), fields.remove(CONTENT_TAG))
    else {
        return Ok(None);
    };

    Ok(Some(ChatMessage {
        sender,
        content,
        kind,
    }))
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
