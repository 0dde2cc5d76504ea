//! Text encryption with AES-256.
//!
//! Plaintext is suffixed with a fixed sentinel and zero-padded to the AES
//! block size before encryption; decryption returns the text left of the
//! first sentinel. Blocks are encrypted independently (ECB), which keeps
//! ciphertexts compatible with existing data produced the same way.
//!
//! ```text
//! encrypt:  text ++ SENTINEL ++ 0x00.. ──AES──► cipher (len % 16 == 0)
//! decrypt:  cipher ──AES⁻¹──► text ++ SENTINEL ++ 0x00.. ──split──► text
//! ```

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// Marks the end of the plaintext inside a decrypted buffer.
pub const SENTINEL: &str = "52168@E4B9!13Fe-33!B0D9CF6!$@!~";

/// Errors that can occur while encrypting or decrypting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("input is empty")]
    EmptyInput,

    #[error("invalid key")]
    InvalidKey,

    #[error("cipher length {len} is not a multiple of {}", BLOCK_SIZE)]
    Misaligned { len: usize },

    #[error("invalid base64: {0}")]
    Base64(String),

    #[error("decrypted text is not valid UTF-8")]
    Utf8,

    #[error("decrypted text has no sentinel")]
    MissingSentinel,
}

/// A 256-bit AES key.
#[derive(Clone, PartialEq, Eq)]
pub struct AesKey([u8; KEY_SIZE]);

impl AesKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(text.trim()).map_err(|_| CryptoError::InvalidKey)?;
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self(bytes))
    }

    /// An all-zero key is treated as unset.
    pub fn is_valid(&self) -> bool {
        self.0.iter().any(|byte| *byte != 0)
    }

    fn cipher(&self) -> Result<Aes256, CryptoError> {
        if !self.is_valid() {
            return Err(CryptoError::InvalidKey);
        }
        Ok(Aes256::new(GenericArray::from_slice(&self.0)))
    }
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesKey(..)")
    }
}

/// Encrypt `text` into block-aligned cipher bytes.
pub fn encrypt(text: &str, key: &AesKey) -> Result<Vec<u8>, CryptoError> {
    if text.is_empty() {
        return Err(CryptoError::EmptyInput);
    }
    let cipher = key.cipher()?;

    let mut buffer = Vec::with_capacity(text.len() + SENTINEL.len() + BLOCK_SIZE);
    buffer.extend_from_slice(text.as_bytes());
    buffer.extend_from_slice(SENTINEL.as_bytes());
    let aligned = buffer.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    buffer.resize(aligned, 0);

    for block in buffer.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(buffer)
}

/// Decrypt cipher bytes produced by [`encrypt`].
///
/// The input is never modified; decryption works on a copy.
pub fn decrypt(cipher_text: &[u8], key: &AesKey) -> Result<String, CryptoError> {
    if cipher_text.is_empty() {
        return Err(CryptoError::EmptyInput);
    }
    let cipher = key.cipher()?;
    if cipher_text.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::Misaligned {
            len: cipher_text.len(),
        });
    }

    let mut buffer = cipher_text.to_vec();
    for block in buffer.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    let end = find_sentinel(&buffer).ok_or(CryptoError::MissingSentinel)?;
    buffer.truncate(end);
    String::from_utf8(buffer).map_err(|_| CryptoError::Utf8)
}

/// [`encrypt`], then standard base64.
pub fn encrypt_base64(text: &str, key: &AesKey) -> Result<String, CryptoError> {
    encrypt(text, key).map(|bytes| STANDARD.encode(bytes))
}

/// Standard base64 decode, then [`decrypt`].
pub fn decrypt_base64(encoded: &str, key: &AesKey) -> Result<String, CryptoError> {
    if encoded.trim().is_empty() {
        return Err(CryptoError::EmptyInput);
    }
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CryptoError::Base64(e.to_string()))?;
    decrypt(&bytes, key)
}

fn find_sentinel(buffer: &[u8]) -> Option<usize> {
    let sentinel = SENTINEL.as_bytes();
    buffer
        .windows(sentinel.len())
        .position(|window| window == sentinel)
}
