//! RSVP Manager
//!
//! Short-lived sealed reference from an application to a grant, exchanged
//! for a user ticket. Only authenticity and shape are guaranteed here; the
//! exchange endpoint checks expiry and application.

use crate::{
    application::Application,
    config::{duration_ms, Settings},
    envelope::{self, Password},
    error::{CredentialKind, OzError, Result},
    grant::Grant,
    now_millis,
};
use serde::{Deserialize, Serialize};

/// Opened RSVP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rsvp {
    /// Application the grant was given to
    pub app: String,
    /// Grant identifier
    pub grant: String,
    /// Expiration, Unix milliseconds
    pub exp: i64,
}

impl Rsvp {
    /// Check if the RSVP is expired at `now`
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }
}

/// Seal an RSVP for `grant`
pub fn issue(
    app: &Application,
    grant: &Grant,
    password: &Password,
    settings: &Settings,
) -> Result<String> {
    if grant.app != app.id {
        return Err(OzError::InvalidGrant(
            "Grant belongs to another application".to_string(),
        ));
    }

    let rsvp = Rsvp {
        app: app.id.clone(),
        grant: grant.id.clone(),
        exp: now_millis().saturating_add(duration_ms(settings.rsvp.ttl)),
    };

    envelope::seal(
        &rsvp,
        password,
        &settings.ticket.encryption,
        &settings.ticket.integrity,
    )
    .map_err(|e| OzError::credential(CredentialKind::Rsvp, e))
}

/// Open an RSVP
pub fn parse(rsvp: &str, password: &Password, settings: &Settings) -> Result<Rsvp> {
    envelope::unseal(
        rsvp,
        password,
        &settings.ticket.encryption,
        &settings.ticket.integrity,
    )
    .map_err(|e| OzError::credential(CredentialKind::Rsvp, e))
}
