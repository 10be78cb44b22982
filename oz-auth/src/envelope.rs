//! Sealed Envelope Codec
//!
//! Authenticated encryption of structured records into a single string:
//!
//! ```text
//! integritySalt:integrityDigest:encryptionSalt:iv:ciphertext
//! ```
//!
//! Salts are hex, the other fields base64url without padding, so none of
//! them can contain the `:` delimiter. Encryption and integrity keys are
//! derived independently from one password (PBKDF2-HMAC-SHA256), each with
//! its own salt. Unsealing verifies the digest before anything is decrypted.

use crate::config::{EncryptionOptions, IntegrityOptions, MIN_PASSWORD_LENGTH};
use crate::crypto;
use crate::error::{OzError, Result, SealError};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::pbkdf2;
use serde::{de::DeserializeOwned, Serialize};
use std::num::NonZeroU32;

/// Field delimiter of the sealed format
pub const DELIMITER: char = ':';

/// Number of fields in a sealed string
pub const FIELD_COUNT: usize = 5;

/// Length of every derived key, in bytes
const DERIVED_KEY_LEN: usize = 32;

/// Sealing password
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Wrap a password, enforcing the minimum length
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(OzError::ConfigError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(Self(secret))
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

/// Key material derived from the password
pub struct DerivedKey {
    /// Raw key bytes
    pub key: [u8; DERIVED_KEY_LEN],
    /// Salt the key was derived with
    pub salt: String,
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .field("salt", &self.salt)
            .finish()
    }
}

/// Derive a key from `password`, generating a fresh salt unless one is given
pub fn derive_key(
    password: &Password,
    salt_bits: usize,
    iterations: u32,
    salt: Option<&str>,
) -> std::result::Result<DerivedKey, SealError> {
    let iterations = NonZeroU32::new(iterations)
        .ok_or_else(|| SealError::Crypto("PBKDF2 iterations must be positive".to_string()))?;

    let salt = match salt {
        Some(salt) => salt.to_string(),
        None => crypto::random_salt(salt_bits).map_err(|e| SealError::Crypto(e.to_string()))?,
    };

    let mut key = [0u8; DERIVED_KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt.as_bytes(),
        password.as_bytes(),
        &mut key,
    );

    Ok(DerivedKey { key, salt })
}

/// Seal `record` into the five-field envelope string
pub fn seal<T: Serialize + ?Sized>(
    record: &T,
    password: &Password,
    encryption: &EncryptionOptions,
    integrity: &IntegrityOptions,
) -> std::result::Result<String, SealError> {
    let plaintext = serde_json::to_vec(record)
        .map_err(|e| SealError::Crypto(format!("Cannot serialize record: {}", e)))?;

    let enc_key = derive_key(password, encryption.salt_bits, encryption.iterations, None)?;
    let iv = crypto::random_bytes(encryption.algorithm.iv_len())
        .map_err(|e| SealError::Crypto(e.to_string()))?;
    let ciphertext = encryption
        .algorithm
        .encrypt(&enc_key.key[..encryption.algorithm.key_len()], &iv, &plaintext)
        .map_err(|e| SealError::Crypto(e.to_string()))?;

    let mac_base = format!(
        "{}{DELIMITER}{}{DELIMITER}{}",
        enc_key.salt,
        URL_SAFE_NO_PAD.encode(&iv),
        URL_SAFE_NO_PAD.encode(&ciphertext)
    );

    let int_key = derive_key(password, integrity.salt_bits, integrity.iterations, None)?;
    let digest = integrity.algorithm.sign(&int_key.key, mac_base.as_bytes());

    Ok(format!(
        "{}{DELIMITER}{}{DELIMITER}{}",
        int_key.salt,
        URL_SAFE_NO_PAD.encode(digest),
        mac_base
    ))
}

/// Open a sealed string produced by [`seal`]
pub fn unseal<T: DeserializeOwned>(
    sealed: &str,
    password: &Password,
    encryption: &EncryptionOptions,
    integrity: &IntegrityOptions,
) -> std::result::Result<T, SealError> {
    let parts: Vec<&str> = sealed.split(DELIMITER).collect();
    let &[int_salt, digest, enc_salt, iv, ciphertext] = parts.as_slice() else {
        return Err(SealError::Malformed(format!(
            "expected {} fields, found {}",
            FIELD_COUNT,
            parts.len()
        )));
    };

    let mac_base = format!("{enc_salt}{DELIMITER}{iv}{DELIMITER}{ciphertext}");
    verify_digest(password, integrity, int_salt, digest, &mac_base)?;

    let iv = URL_SAFE_NO_PAD
        .decode(iv)
        .map_err(|_| SealError::Malformed("invalid iv encoding".to_string()))?;
    if iv.len() != encryption.algorithm.iv_len() {
        return Err(SealError::Malformed("invalid iv length".to_string()));
    }
    let ciphertext = URL_SAFE_NO_PAD
        .decode(ciphertext)
        .map_err(|_| SealError::Malformed("invalid ciphertext encoding".to_string()))?;

    let enc_key = derive_key(
        password,
        encryption.salt_bits,
        encryption.iterations,
        Some(enc_salt),
    )?;
    let plaintext = encryption
        .algorithm
        .decrypt(
            &enc_key.key[..encryption.algorithm.key_len()],
            &iv,
            &ciphertext,
        )
        .ok_or_else(|| SealError::Deserialization("decryption failed".to_string()))?;

    serde_json::from_slice(&plaintext).map_err(|e| SealError::Deserialization(e.to_string()))
}

fn verify_digest(
    password: &Password,
    integrity: &IntegrityOptions,
    salt: &str,
    digest: &str,
    mac_base: &str,
) -> std::result::Result<(), SealError> {
    let tag = URL_SAFE_NO_PAD
        .decode(digest)
        .map_err(|_| SealError::Integrity)?;
    let key = derive_key(password, integrity.salt_bits, integrity.iterations, Some(salt))?;

    if integrity.algorithm.verify(&key.key, mac_base.as_bytes(), &tag) {
        Ok(())
    } else {
        Err(SealError::Integrity)
    }
}
