//! Client Application
//!
//! Long-lived application record owned by the resource server's store.

use crate::error::{OzError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Registered client application
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Application {
    /// Application identifier (Basic auth username)
    #[validate(length(min = 1, max = 255))]
    pub id: String,

    /// Shared secret (Basic auth password)
    #[validate(length(min = 1))]
    pub secret: String,

    /// Scope available to the application
    #[serde(default)]
    pub scope: Vec<String>,

    /// Ticket lifetime override
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,

    /// Whether tickets of this application may be delegated
    #[serde(default)]
    pub delegate: bool,
}

impl Application {
    /// Create a new application
    pub fn new(
        id: impl Into<String>,
        secret: impl Into<String>,
        scope: Vec<String>,
    ) -> Result<Self> {
        let app = Self {
            id: id.into(),
            secret: secret.into(),
            scope,
            ttl: None,
            delegate: false,
        };

        app.validate()
            .map_err(|e| OzError::ConfigError(format!("Invalid application: {}", e)))?;
        crate::scope::validate(&app.scope)?;

        Ok(app)
    }

    /// Grant delegation rights
    pub fn with_delegation(mut self) -> Self {
        self.delegate = true;
        self
    }

    /// Override the ticket lifetime
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("ttl", &self.ttl)
            .field("delegate", &self.delegate)
            .finish()
    }
}
