//! Callback signature computation and verification.
//!
//! WeCom signs every callback with the SHA-1 digest of the token, timestamp,
//! nonce and ciphertext. The four values are sorted byte-wise before being
//! concatenated, so the signature does not depend on argument order.

use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

/// Compute the callback signature as a lowercase hex string.
///
/// # Examples
///
/// ```rust
/// use wecom_relay_core::signature::sign;
///
/// let signature = sign("token", "1700000000", "nonce", "ciphertext");
/// assert_eq!(signature.len(), 40);
/// ```
pub fn sign(token: &str, timestamp: &str, nonce: &str, ciphertext: &str) -> String {
    let mut parts = [token, timestamp, nonce, ciphertext];
    // `str` ordering is byte-wise lexicographic.
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Check `candidate` against the signature computed from the other inputs.
///
/// The comparison runs in constant time over the digest bytes. A candidate
/// of the wrong length is rejected up front; the length of a SHA-1 hex
/// digest is public.
pub fn verify(candidate: &str, token: &str, timestamp: &str, nonce: &str, ciphertext: &str) -> bool {
    let expected = sign(token, timestamp, nonce, ciphertext);
    constant_time_compare(candidate.as_bytes(), expected.as_bytes())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
