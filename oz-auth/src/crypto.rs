//! Cryptographic primitives
//!
//! Closed algorithm enums plus the randomness and comparison helpers shared
//! by the envelope codec and the request authenticator.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use ring::hmac;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::{OzError, Result};

/// MAC algorithm used for envelope integrity and request signing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacAlgorithm {
    /// HMAC-SHA256
    #[default]
    Sha256,
    /// HMAC-SHA384
    Sha384,
    /// HMAC-SHA512
    Sha512,
}

impl MacAlgorithm {
    fn ring_algorithm(self) -> hmac::Algorithm {
        match self {
            MacAlgorithm::Sha256 => hmac::HMAC_SHA256,
            MacAlgorithm::Sha384 => hmac::HMAC_SHA384,
            MacAlgorithm::Sha512 => hmac::HMAC_SHA512,
        }
    }

    /// HMAC over `data`
    pub fn sign(self, key: &[u8], data: &[u8]) -> Vec<u8> {
        let key = hmac::Key::new(self.ring_algorithm(), key);
        hmac::sign(&key, data).as_ref().to_vec()
    }

    /// Constant-time HMAC verification
    pub fn verify(self, key: &[u8], data: &[u8], tag: &[u8]) -> bool {
        let key = hmac::Key::new(self.ring_algorithm(), key);
        hmac::verify(&key, data, tag).is_ok()
    }
}

impl std::fmt::Display for MacAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Sha384 => write!(f, "sha384"),
            Self::Sha512 => write!(f, "sha512"),
        }
    }
}

/// Symmetric cipher used inside the sealed envelope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherAlgorithm {
    /// AES-256 in GCM mode
    #[default]
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    /// ChaCha20-Poly1305
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

impl CipherAlgorithm {
    /// Key length in bytes
    pub const fn key_len(self) -> usize {
        32
    }

    /// IV length in bytes
    pub const fn iv_len(self) -> usize {
        12
    }

    /// Encrypt `plaintext` under `key` and `iv`
    pub fn encrypt(self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        match self {
            CipherAlgorithm::Aes256Gcm => {
                use aes_gcm::aead::{Aead, KeyInit};
                let cipher = aes_gcm::Aes256Gcm::new_from_slice(key).map_err(|e| {
                    OzError::InternalError(format!("Failed to create cipher: {}", e))
                })?;
                cipher
                    .encrypt(aes_gcm::Nonce::from_slice(iv), plaintext)
                    .map_err(|e| OzError::InternalError(format!("Encryption failed: {}", e)))
            }
            CipherAlgorithm::ChaCha20Poly1305 => {
                use chacha20poly1305::aead::{Aead, KeyInit};
                let cipher =
                    chacha20poly1305::ChaCha20Poly1305::new_from_slice(key).map_err(|e| {
                        OzError::InternalError(format!("Failed to create cipher: {}", e))
                    })?;
                cipher
                    .encrypt(chacha20poly1305::Nonce::from_slice(iv), plaintext)
                    .map_err(|e| OzError::InternalError(format!("Encryption failed: {}", e)))
            }
        }
    }

    /// Decrypt `ciphertext`; `None` when the cipher rejects it
    pub fn decrypt(self, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Option<Vec<u8>> {
        if iv.len() != self.iv_len() {
            return None;
        }

        match self {
            CipherAlgorithm::Aes256Gcm => {
                use aes_gcm::aead::{Aead, KeyInit};
                aes_gcm::Aes256Gcm::new_from_slice(key)
                    .ok()?
                    .decrypt(aes_gcm::Nonce::from_slice(iv), ciphertext)
                    .ok()
            }
            CipherAlgorithm::ChaCha20Poly1305 => {
                use chacha20poly1305::aead::{Aead, KeyInit};
                chacha20poly1305::ChaCha20Poly1305::new_from_slice(key)
                    .ok()?
                    .decrypt(chacha20poly1305::Nonce::from_slice(iv), ciphertext)
                    .ok()
            }
        }
    }
}

impl std::fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aes256Gcm => write!(f, "aes-256-gcm"),
            Self::ChaCha20Poly1305 => write!(f, "chacha20-poly1305"),
        }
    }
}

/// Fill a fresh buffer from the OS CSPRNG
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| OzError::InternalError(format!("Random source failed: {}", e)))?;
    Ok(buf)
}

/// `bits` random bits, hex encoded
pub fn random_salt(bits: usize) -> Result<String> {
    Ok(hex::encode(random_bytes(bits / 8)?))
}

/// `bits` random bits, base64url encoded
pub fn random_key(bits: usize) -> Result<String> {
    Ok(URL_SAFE_NO_PAD.encode(random_bytes(bits / 8)?))
}

/// Constant-time equality of two byte strings
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}
