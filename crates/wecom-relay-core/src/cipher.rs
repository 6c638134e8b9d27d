//! AES-256-CBC encryption as used by WeCom callbacks.
//!
//! # Protocol conventions
//!
//! - The key is the 43-character "EncodingAESKey" from the WeCom admin
//!   console, base64-decoded after appending a single `=`.
//! - The IV is the first 16 bytes of the key. This is a fixed property of
//!   the platform protocol and must be kept for interoperability.
//! - Plaintext is PKCS#7 padded to a multiple of 32 bytes, not the AES block
//!   size of 16, so a valid pad byte ranges from 1 to 32.

use crate::{CallbackError, CallbackResult, DecryptStage, KeyError};
use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{
    alphabet,
    engine::{general_purpose::STANDARD, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Length of the configured EncodingAESKey in characters.
pub const ENCODING_KEY_LEN: usize = 43;

/// Length of the derived AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// Block size used by the protocol's PKCS#7 padding.
pub const PKCS7_BLOCK_SIZE: usize = 32;

// The console generates arbitrary 43-character strings, so the final
// character may carry non-zero trailing bits.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Derived AES-256 key together with its protocol IV.
///
/// Key bytes are zeroized on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AesKey {
    key: [u8; KEY_LEN],
    iv: [u8; AES_BLOCK_SIZE],
}

impl AesKey {
    /// Derive the key from a 43-character EncodingAESKey.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the string has the wrong length, is not
    /// base64, or does not decode to exactly 32 bytes.
    pub fn from_encoding_key(encoding_key: &str) -> Result<Self, KeyError> {
        if encoding_key.len() != ENCODING_KEY_LEN {
            return Err(KeyError::InvalidLength {
                expected: ENCODING_KEY_LEN,
                actual: encoding_key.len(),
            });
        }

        let mut padded = String::with_capacity(ENCODING_KEY_LEN + 1);
        padded.push_str(encoding_key);
        padded.push('=');

        let mut decoded = KEY_ENGINE
            .decode(padded.as_bytes())
            .map_err(|_| KeyError::InvalidEncoding)?;
        padded.zeroize();

        if decoded.len() != KEY_LEN {
            let actual = decoded.len();
            decoded.zeroize();
            return Err(KeyError::InvalidKeySize { actual });
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&decoded);
        decoded.zeroize();

        Ok(Self::from_bytes(key))
    }

    /// Build a key directly from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        let mut iv = [0u8; AES_BLOCK_SIZE];
        iv.copy_from_slice(&key[..AES_BLOCK_SIZE]);
        Self { key, iv }
    }

    /// Raw key bytes (only for immediate use)
    pub fn expose_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// IV derived from the key
    pub fn iv(&self) -> &[u8; AES_BLOCK_SIZE] {
        &self.iv
    }
}

// Security: Don't expose key material in debug output
impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesKey")
            .field("key", &"<REDACTED>")
            .finish()
    }
}

/// Decrypt a base64 ciphertext and strip its PKCS#7 padding.
///
/// # Errors
///
/// Returns [`CallbackError::DecryptionFailed`] with the failing stage:
/// - [`DecryptStage::Base64`] if the input is not valid base64
/// - [`DecryptStage::Cipher`] if the decoded length is zero or not a
///   multiple of the AES block size
/// - [`DecryptStage::Padding`] if the pad byte is outside `1..=32` or the
///   trailing bytes disagree with it
pub fn decrypt(key: &AesKey, ciphertext_base64: &str) -> CallbackResult<Vec<u8>> {
    let mut buffer = STANDARD
        .decode(ciphertext_base64)
        .map_err(|_| CallbackError::decryption(DecryptStage::Base64))?;

    if buffer.is_empty() || buffer.len() % AES_BLOCK_SIZE != 0 {
        return Err(CallbackError::decryption(DecryptStage::Cipher));
    }

    let decrypted_len = Aes256CbcDec::new(&key.key.into(), &key.iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| CallbackError::decryption(DecryptStage::Cipher))?
        .len();
    buffer.truncate(decrypted_len);

    let unpadded_len = pkcs7_unpad(&buffer, PKCS7_BLOCK_SIZE)?.len();
    buffer.truncate(unpadded_len);

    Ok(buffer)
}

/// Pad, encrypt and base64-encode `plaintext`.
///
/// The inverse of [`decrypt`]; used to build passive replies and test
/// vectors.
pub fn encrypt(key: &AesKey, plaintext: &[u8]) -> CallbackResult<String> {
    let mut buffer = pkcs7_pad(plaintext, PKCS7_BLOCK_SIZE);
    let len = buffer.len();

    let encrypted = Aes256CbcEnc::new(&key.key.into(), &key.iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
        .map_err(|_| CallbackError::decryption(DecryptStage::Cipher))?;

    Ok(STANDARD.encode(encrypted))
}

/// Append PKCS#7 padding up to the next multiple of `block_size`.
///
/// A full block of padding is added when the input is already aligned.
pub fn pkcs7_pad(data: &[u8], block_size: usize) -> Vec<u8> {
    debug_assert!((1..=255).contains(&block_size));

    let pad = block_size - (data.len() % block_size);
    let mut padded = Vec::with_capacity(data.len() + pad);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad, pad as u8);
    padded
}

/// Strip PKCS#7 padding, accepting pad bytes in `1..=block_size`.
///
/// # Errors
///
/// Returns [`CallbackError::DecryptionFailed`] at the padding stage if the
/// data is empty, the pad byte is out of range, or any of the trailing
/// bytes differs from the pad byte.
pub fn pkcs7_unpad(data: &[u8], block_size: usize) -> CallbackResult<&[u8]> {
    let padding_error = || CallbackError::decryption(DecryptStage::Padding);

    let pad = *data.last().ok_or_else(padding_error)? as usize;
    if pad == 0 || pad > block_size || pad > data.len() {
        return Err(padding_error());
    }

    let (content, padding) = data.split_at(data.len() - pad);
    if padding.iter().any(|&b| b as usize != pad) {
        return Err(padding_error());
    }

    Ok(content)
}

#[cfg(test)]
#[path = "cipher_tests.rs"]
mod tests;
