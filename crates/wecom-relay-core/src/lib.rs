//! # WeCom Relay Core
//!
//! Protocol logic for the WeCom callback relay.
//!
//! This crate authenticates and decrypts WeCom callback requests and turns
//! the decrypted payload into a [`ChatMessage`] that can be handed to a
//! downstream [`MessageSink`].
//!
//! ## Architecture
//!
//! Each protocol stage is a free function over immutable inputs:
//! - [`signature`]: SHA-1 fingerprint over the sorted request parameters
//! - [`cipher`]: AES-256-CBC with the key-derived IV and 32-byte PKCS#7 bound
//! - [`frame`]: length-prefixed envelope with the trailing corp id
//! - [`message`]: structural extraction of the chat message fields
//!
//! [`CallbackCrypto`] holds the per-integration secrets and composes the
//! stages into the two callback flows.
//!
//! ## Usage
//!
//! ```rust
//! use wecom_relay_core::CallbackCrypto;
//!
//! let crypto = CallbackCrypto::new("token", &"A".repeat(43), "corp-id").unwrap();
//! let signature = crypto.sign("1700000000", "nonce", "ciphertext");
//! assert!(crypto.verify_signature(&signature, "1700000000", "nonce", "ciphertext"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard result type for callback processing
pub type CallbackResult<T> = Result<T, CallbackError>;

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for logging and alerting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that may succeed on a later attempt
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Security-related failures requiring attention
    Security,
    /// Configuration errors preventing startup
    Configuration,
}

/// Stage of the decryption pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecryptStage {
    /// Ciphertext was not valid base64
    Base64,
    /// Ciphertext length or cipher initialisation was invalid
    Cipher,
    /// PKCS#7 padding was out of range or inconsistent
    Padding,
}

impl fmt::Display for DecryptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Base64 => "base64",
            Self::Cipher => "cipher",
            Self::Padding => "padding",
        };
        f.write_str(name)
    }
}

/// Failures while authenticating, decrypting or parsing a callback.
///
/// Display strings never contain key material, plaintext or the submitted
/// signature, so they are safe to log. They are still not meant to be
/// returned to the remote caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackError {
    /// The request signature does not match the computed fingerprint.
    #[error("Callback signature verification failed")]
    AuthenticationFailed,

    /// The ciphertext could not be decoded or decrypted.
    #[error("Callback decryption failed at {stage} stage")]
    DecryptionFailed { stage: DecryptStage },

    /// The decrypted frame is structurally invalid.
    #[error("Malformed decrypted frame: {reason}")]
    MalformedFrame { reason: String },

    /// The frame was encrypted for a different corp id.
    #[error("Frame corp id does not match the configured corp id")]
    TenantMismatch,

    /// The XML document (outer body or inner payload) is unusable.
    #[error("Malformed callback payload: {reason}")]
    MalformedPayload { reason: String },
}

impl CallbackError {
    pub(crate) fn decryption(stage: DecryptStage) -> Self {
        Self::DecryptionFailed { stage }
    }

    pub(crate) fn malformed_frame(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_payload(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Whether the failure indicates a forged or misrouted request rather
    /// than a malformed one.
    pub fn is_security_relevant(&self) -> bool {
        matches!(self, Self::AuthenticationFailed | Self::TenantMismatch)
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        if self.is_security_relevant() {
            ErrorCategory::Security
        } else {
            ErrorCategory::Permanent
        }
    }

    /// Short, stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::DecryptionFailed { .. } => "decryption_failed",
            Self::MalformedFrame { .. } => "malformed_frame",
            Self::TenantMismatch => "tenant_mismatch",
            Self::MalformedPayload { .. } => "malformed_payload",
        }
    }
}

/// Invalid key material supplied in configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("Encoding AES key must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Encoding AES key is not valid base64")]
    InvalidEncoding,

    #[error("Encoding AES key decodes to {actual} bytes, expected 32")]
    InvalidKeySize { actual: usize },
}

impl KeyError {
    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Callback signature computation and verification
pub mod signature;

/// AES-256-CBC decryption and PKCS#7 handling
pub mod cipher;

/// Length-prefixed decrypted frame layout
pub mod frame;

/// Structural XML field reader
pub mod xml;

/// Chat message extraction
pub mod message;

/// Secret bundle and end-to-end callback flows
pub mod callback;

/// Downstream delivery abstraction
pub mod relay;

// Re-export key types for convenience
pub use callback::{CallbackCrypto, CallbackParams, EncryptedEnvelope};
pub use cipher::AesKey;
pub use message::{ChatMessage, MessageKind};
pub use relay::{DeliveryError, MessageSink};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
