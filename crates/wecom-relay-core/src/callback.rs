//! Per-integration secret bundle and the two callback flows.
//!
//! WeCom calls the relay in two ways:
//! - **URL verification** (`GET`): the `echostr` query parameter carries an
//!   encrypted challenge which must be decrypted and echoed back.
//! - **Message delivery** (`POST`): the body is an XML document whose
//!   `Encrypt` element carries the encrypted message.
//!
//! Both are signed over the ciphertext with the shared token, and both
//! decrypt to a frame addressed to the configured corp id.

use crate::cipher::{self, AesKey};
use crate::message::{self, ChatMessage};
use crate::{frame, signature, xml, CallbackError, CallbackResult, KeyError};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const ENCRYPT_TAG: &str = "Encrypt";
const TO_USER_TAG: &str = "ToUserName";
const AGENT_ID_TAG: &str = "AgentID";

/// Signature parameters WeCom appends to every callback URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackParams {
    /// `msg_signature` query parameter
    pub signature: String,
    /// `timestamp` query parameter
    pub timestamp: String,
    /// `nonce` query parameter
    pub nonce: String,
}

impl CallbackParams {
    pub fn new(
        signature: impl Into<String>,
        timestamp: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            signature: signature.into(),
            timestamp: timestamp.into(),
            nonce: nonce.into(),
        }
    }
}

/// Outer XML document of a message-delivery callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// Corp id the message is addressed to, as claimed by the sender
    pub to_user_name: Option<String>,
    /// Application agent id
    pub agent_id: Option<String>,
    /// Base64 ciphertext
    pub encrypt: String,
}

impl EncryptedEnvelope {
    /// Parse the POSTed document.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::MalformedPayload`] if the document is not
    /// well-formed or has no `Encrypt` element.
    pub fn parse(body: &str) -> CallbackResult<Self> {
        let mut fields = xml::read_fields(body, &[ENCRYPT_TAG, TO_USER_TAG, AGENT_ID_TAG])?;

        let encrypt = fields
            .remove(ENCRYPT_TAG)
            .ok_or_else(|| CallbackError::malformed_payload("callback body has no Encrypt element"))?;

        Ok(Self {
            to_user_name: fields.remove(TO_USER_TAG),
            agent_id: fields.remove(AGENT_ID_TAG),
            encrypt,
        })
    }
}

/// Token, AES key and corp id of one WeCom integration.
///
/// Immutable once built and safe to share between concurrent requests.
///
/// # Examples
///
/// ```rust
/// use wecom_relay_core::{CallbackCrypto, CallbackParams};
///
/// let crypto = CallbackCrypto::new("T", &"A".repeat(43), "ww-corp").unwrap();
///
/// let echostr = crypto.seal("pong").unwrap();
/// let params = CallbackParams::new(crypto.sign("1", "n", &echostr), "1", "n");
///
/// assert_eq!(crypto.verify_url(&params, &echostr).unwrap(), "pong");
/// ```
#[derive(Clone)]
pub struct CallbackCrypto {
    token: String,
    key: AesKey,
    corp_id: String,
}

impl CallbackCrypto {
    /// Build the bundle from the values shown in the WeCom admin console.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if `encoding_aes_key` is not a valid
    /// 43-character key.
    pub fn new(
        token: impl Into<String>,
        encoding_aes_key: &str,
        corp_id: impl Into<String>,
    ) -> Result<Self, KeyError> {
        Ok(Self::with_key(
            token,
            AesKey::from_encoding_key(encoding_aes_key)?,
            corp_id,
        ))
    }

    /// Build the bundle from an already-derived key.
    pub fn with_key(token: impl Into<String>, key: AesKey, corp_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            key,
            corp_id: corp_id.into(),
        }
    }

    /// Corp id frames must be addressed to
    pub fn corp_id(&self) -> &str {
        &self.corp_id
    }

    /// Compute the signature WeCom would send for `ciphertext`.
    pub fn sign(&self, timestamp: &str, nonce: &str, ciphertext: &str) -> String {
        signature::sign(&self.token, timestamp, nonce, ciphertext)
    }

    /// Constant-time check of a candidate signature.
    pub fn verify_signature(
        &self,
        candidate: &str,
        timestamp: &str,
        nonce: &str,
        ciphertext: &str,
    ) -> bool {
        signature::verify(candidate, &self.token, timestamp, nonce, ciphertext)
    }

    /// Verify `params` over `ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::AuthenticationFailed`] on mismatch.
    pub fn authenticate(&self, params: &CallbackParams, ciphertext: &str) -> CallbackResult<()> {
        if self.verify_signature(&params.signature, &params.timestamp, &params.nonce, ciphertext) {
            Ok(())
        } else {
            Err(CallbackError::AuthenticationFailed)
        }
    }

    /// Decrypt a ciphertext and return the payload of its frame.
    pub fn open(&self, ciphertext: &str) -> CallbackResult<String> {
        let decrypted = cipher::decrypt(&self.key, ciphertext)?;
        frame::parse(&decrypted, &self.corp_id)
    }

    /// Frame and encrypt `payload` for this corp id.
    pub fn seal(&self, payload: &str) -> CallbackResult<String> {
        let frame = frame::build(payload, &self.corp_id)?;
        cipher::encrypt(&self.key, &frame)
    }

    /// Handle a URL verification request and return the challenge to echo.
    ///
    /// # Errors
    ///
    /// - [`CallbackError::AuthenticationFailed`] if the signature over
    ///   `echostr` does not match
    /// - [`CallbackError::DecryptionFailed`], [`CallbackError::MalformedFrame`]
    ///   or [`CallbackError::TenantMismatch`] if the challenge cannot be opened
    #[instrument(skip_all, fields(timestamp = %params.timestamp))]
    pub fn verify_url(&self, params: &CallbackParams, echostr: &str) -> CallbackResult<String> {
        self.authenticate(params, echostr)?;
        let challenge = self.open(echostr)?;
        debug!(challenge_len = challenge.len(), "URL verification challenge decrypted");
        Ok(challenge)
    }

    /// Authenticate and decrypt a message-delivery body, returning the inner
    /// XML payload.
    ///
    /// The signature is checked before any decryption is attempted.
    #[instrument(skip_all, fields(timestamp = %params.timestamp))]
    pub fn decrypt_message(&self, params: &CallbackParams, body: &str) -> CallbackResult<String> {
        let envelope = EncryptedEnvelope::parse(body)?;
        self.authenticate(params, &envelope.encrypt)?;

        let payload = self.open(&envelope.encrypt)?;
        debug!(
            to_user_name = envelope.to_user_name.as_deref().unwrap_or(""),
            agent_id = envelope.agent_id.as_deref().unwrap_or(""),
            payload_len = payload.len(),
            "Callback message decrypted"
        );
        Ok(payload)
    }

    /// Authenticate, decrypt and extract the chat message of a delivery body.
    ///
    /// Returns `Ok(None)` for message kinds the relay does not forward.
    pub fn receive(
        &self,
        params: &CallbackParams,
        body: &str,
    ) -> CallbackResult<Option<ChatMessage>> {
        let payload = self.decrypt_message(params, body)?;
        message::extract(&payload)
    }
}

// Security: Don't expose secrets in debug output
impl std::fmt::Debug for CallbackCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackCrypto")
            .field("token", &"<REDACTED>")
            .field("key", &"<REDACTED>")
            .field("corp_id", &self.corp_id)
            .finish()
    }
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
