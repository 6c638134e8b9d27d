//! Decrypted frame layout.
//!
//! ```text
//! +----------------+-------------------+-----------------+
//! | length (4 hex) | payload (length)  | corp id (rest)  |
//! +----------------+-------------------+-----------------+
//! ```
//!
//! The length is four ASCII hex digits counting payload bytes. Everything
//! after the payload is the corp id the frame was encrypted for.

use crate::{CallbackError, CallbackResult};

/// Width of the ASCII-hex length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest payload the length prefix can describe.
pub const MAX_PAYLOAD_LEN: usize = 0xFFFF;

/// Split a decrypted frame and return its payload.
///
/// # Errors
///
/// - [`CallbackError::MalformedFrame`] if the bytes are not UTF-8, the
///   prefix is not four hex digits, or the declared length runs past the end
///   of the frame or splits a character
/// - [`CallbackError::TenantMismatch`] if the trailing corp id differs from
///   `expected_corp_id`
pub fn parse(decrypted: &[u8], expected_corp_id: &str) -> CallbackResult<String> {
    let text = std::str::from_utf8(decrypted)
        .map_err(|_| CallbackError::malformed_frame("frame is not valid UTF-8"))?;

    let prefix = text
        .get(..LENGTH_PREFIX_LEN)
        .ok_or_else(|| CallbackError::malformed_frame("frame is shorter than length prefix"))?;

    // from_str_radix alone would accept a leading '+'.
    if !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CallbackError::malformed_frame(
            "length prefix is not hexadecimal",
        ));
    }
    let length = usize::from_str_radix(prefix, 16)
        .map_err(|_| CallbackError::malformed_frame("length prefix is not hexadecimal"))?;

    let payload_end = LENGTH_PREFIX_LEN + length;
    if payload_end > text.len() {
        return Err(CallbackError::MalformedFrame {
            reason: format!(
                "declared payload length {} exceeds available {} bytes",
                length,
                text.len() - LENGTH_PREFIX_LEN
            ),
        });
    }

    let payload = text
        .get(LENGTH_PREFIX_LEN..payload_end)
        .ok_or_else(|| CallbackError::malformed_frame("payload length splits a character"))?;
    let corp_id = text
        .get(payload_end..)
        .ok_or_else(|| CallbackError::malformed_frame("payload length splits a character"))?;

    if corp_id != expected_corp_id {
        return Err(CallbackError::TenantMismatch);
    }

    Ok(payload.to_string())
}

/// Assemble a frame for `payload` addressed to `corp_id`.
///
/// # Errors
///
/// Returns [`CallbackError::MalformedFrame`] if the payload is longer than
/// [`MAX_PAYLOAD_LEN`] bytes.
pub fn build(payload: &str, corp_id: &str) -> CallbackResult<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(CallbackError::MalformedFrame {
            reason: format!(
                "payload of {} bytes exceeds maximum of {}",
                payload.len(),
                MAX_PAYLOAD_LEN
            ),
        });
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len() + corp_id.len());
    frame.extend_from_slice(format!("{:04x}", payload.len()).as_bytes());
    frame.extend_from_slice(payload.as_bytes());
    frame.extend_from_slice(corp_id.as_bytes());
    Ok(frame)
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
