//! Protocol settings
//!
//! Settings are loaded once (TOML, every field defaulted) and handed around
//! as an immutable value. [`SettingsHandle`] is the single update path: an
//! operation takes one [`Arc<Settings>`] snapshot and keeps it to the end, so
//! a concurrent update never mixes cipher or iteration settings mid-call.

use crate::crypto::{CipherAlgorithm, MacAlgorithm};
use crate::error::{OzError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Minimum length of a sealing password
pub const MIN_PASSWORD_LENGTH: usize = 32;

/// Protocol settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Ticket settings
    #[serde(default)]
    pub ticket: TicketSettings,
    /// RSVP settings
    #[serde(default)]
    pub rsvp: RsvpSettings,
}

/// Ticket settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketSettings {
    /// Default ticket lifetime
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Per-ticket key length in bits
    pub secret_bits: usize,
    /// Request MAC algorithm handed out with new tickets
    pub hmac_algorithm: MacAlgorithm,
    /// Replay tolerance on request timestamps
    #[serde(with = "humantime_serde")]
    pub timestamp_window: Duration,
    /// Envelope encryption key derivation
    pub encryption: EncryptionOptions,
    /// Envelope integrity key derivation
    pub integrity: IntegrityOptions,
}

impl Default for TicketSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            secret_bits: 256,
            hmac_algorithm: MacAlgorithm::Sha256,
            timestamp_window: Duration::from_secs(5 * 60),
            encryption: EncryptionOptions::default(),
            integrity: IntegrityOptions::default(),
        }
    }
}

impl TicketSettings {
    /// Timestamp window in milliseconds
    pub fn timestamp_window_ms(&self) -> i64 {
        duration_ms(self.timestamp_window)
    }
}

/// Encryption key derivation and cipher choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionOptions {
    /// Salt length in bits
    pub salt_bits: usize,
    /// Cipher
    pub algorithm: CipherAlgorithm,
    /// PBKDF2 iterations
    pub iterations: u32,
}

impl Default for EncryptionOptions {
    fn default() -> Self {
        Self {
            salt_bits: 256,
            algorithm: CipherAlgorithm::Aes256Gcm,
            iterations: 1,
        }
    }
}

/// Integrity key derivation and MAC choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityOptions {
    /// Salt length in bits
    pub salt_bits: usize,
    /// MAC
    pub algorithm: MacAlgorithm,
    /// PBKDF2 iterations
    pub iterations: u32,
}

impl Default for IntegrityOptions {
    fn default() -> Self {
        Self {
            salt_bits: 256,
            algorithm: MacAlgorithm::Sha256,
            iterations: 1,
        }
    }
}

/// RSVP settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsvpSettings {
    /// RSVP lifetime
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for RsvpSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
        }
    }
}

impl Settings {
    /// Parse settings from TOML
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)
            .map_err(|e| OzError::ConfigError(format!("Failed to parse settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OzError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Check invariants the type system cannot express
    pub fn validate(&self) -> Result<()> {
        check_bits("ticket.secret_bits", self.ticket.secret_bits)?;
        if self.ticket.secret_bits < 128 {
            return Err(OzError::ConfigError(
                "ticket.secret_bits must be at least 128".to_string(),
            ));
        }
        check_bits(
            "ticket.encryption.salt_bits",
            self.ticket.encryption.salt_bits,
        )?;
        check_bits("ticket.integrity.salt_bits", self.ticket.integrity.salt_bits)?;

        if self.ticket.encryption.iterations == 0 || self.ticket.integrity.iterations == 0 {
            return Err(OzError::ConfigError(
                "PBKDF2 iterations must be positive".to_string(),
            ));
        }

        for (name, value) in [
            ("ticket.ttl", self.ticket.ttl),
            ("ticket.timestamp_window", self.ticket.timestamp_window),
            ("rsvp.ttl", self.rsvp.ttl),
        ] {
            if duration_ms(value) == 0 {
                return Err(OzError::ConfigError(format!("{} must be positive", name)));
            }
        }

        Ok(())
    }
}

fn check_bits(name: &str, bits: usize) -> Result<()> {
    if bits == 0 || bits % 8 != 0 {
        return Err(OzError::ConfigError(format!(
            "{} must be a positive multiple of 8, got {}",
            name, bits
        )));
    }
    Ok(())
}

/// Milliseconds in a duration, saturating
pub fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Shared, guarded settings
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    inner: Arc<RwLock<Arc<Settings>>>,
}

impl SettingsHandle {
    /// Wrap validated settings
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Arc::new(settings))),
        })
    }

    /// Consistent view for the duration of one operation
    pub fn snapshot(&self) -> Arc<Settings> {
        let guard = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the settings; in-flight operations keep their snapshot
    pub fn update(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(settings);
        tracing::info!("Oz settings updated");
        Ok(())
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(Settings::default()))),
        }
    }
}
