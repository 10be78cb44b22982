//! Grant
//!
//! A resource owner's consent for an application to act on their behalf.

use crate::error::{OzError, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Persisted consent record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Grant {
    /// Grant identifier
    #[validate(length(min = 1))]
    pub id: String,

    /// Application the grant was given to
    #[validate(length(min = 1))]
    pub app: String,

    /// Resource owner
    #[validate(length(min = 1))]
    pub user: String,

    /// Scope granted; `None` means the application's full scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,

    /// Expiration, Unix milliseconds
    pub exp: i64,
}

impl Grant {
    /// Create a grant with a random identifier
    pub fn new(app: impl Into<String>, user: impl Into<String>, exp: i64) -> Result<Self> {
        let grant = Self {
            id: uuid::Uuid::new_v4().to_string(),
            app: app.into(),
            user: user.into(),
            scope: None,
            exp,
        };

        grant
            .validate()
            .map_err(|e| OzError::InvalidGrant(format!("Invalid grant: {}", e)))?;

        Ok(grant)
    }

    /// Restrict the granted scope
    pub fn with_scope(mut self, scope: Vec<String>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Check if the grant is expired at `now`
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }
}
