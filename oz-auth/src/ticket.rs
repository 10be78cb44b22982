//! Ticket Manager
//!
//! A ticket id is the sealed serialization of the full ticket record,
//! including the per-ticket `key`. Nothing about a ticket is stored server
//! side: every request re-opens the envelope, so the envelope is the only
//! source of truth and `exp` is the only revocation mechanism.

use crate::{
    application::Application,
    config::{duration_ms, Settings},
    crypto::{self, MacAlgorithm},
    envelope::{self, Password},
    error::{CredentialKind, OzError, Result},
    grant::Grant,
    now_millis, scope,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server-defined ticket data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketExt {
    /// Returned to the client on issuance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<serde_json::Value>,

    /// Only ever lives inside the sealed ticket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<serde_json::Value>,
}

impl TicketExt {
    fn is_empty(&self) -> bool {
        self.public.is_none() && self.private.is_none()
    }
}

/// Opened ticket, as seen by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Sealed ticket id; not part of the sealed record
    #[serde(skip)]
    pub id: String,

    /// Expiration, Unix milliseconds
    pub exp: i64,

    /// Application the ticket was issued to
    pub app: String,

    /// Resource owner; absent for app tickets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Granted scope
    #[serde(default)]
    pub scope: Vec<String>,

    /// Grant the ticket was issued from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<String>,

    /// Application that delegated this ticket (immediate previous holder)
    #[serde(default, rename = "dlg", skip_serializing_if = "Option::is_none")]
    pub delegated_by: Option<String>,

    /// Whether the ticket may be delegated to another application
    #[serde(default)]
    pub delegate: bool,

    /// Per-ticket MAC key
    pub key: String,

    /// Per-ticket MAC algorithm
    pub algorithm: MacAlgorithm,

    /// Client clock offset, milliseconds
    #[serde(default)]
    pub offset: i64,

    /// Server data
    #[serde(default, skip_serializing_if = "TicketExt::is_empty")]
    pub ext: TicketExt,
}

impl Ticket {
    /// Whether this is a user ticket
    pub fn is_user_ticket(&self) -> bool {
        self.user.is_some()
    }

    /// Check if the ticket is expired at `now`
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }

    fn issued(self) -> IssuedTicket {
        IssuedTicket {
            id: self.id,
            key: self.key,
            algorithm: self.algorithm,
            app: self.app,
            user: self.user,
            scope: self.scope,
            exp: self.exp,
            grant: self.grant,
            delegated_by: self.delegated_by,
            delegate: self.delegate,
            ext: self.ext.public,
        }
    }
}

/// Issuance response handed to the requesting application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedTicket {
    /// Sealed ticket id
    pub id: String,

    /// Per-ticket MAC key, handed out once
    pub key: String,

    /// Per-ticket MAC algorithm
    pub algorithm: MacAlgorithm,

    /// Application the ticket was issued to
    pub app: String,

    /// Resource owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Granted scope
    pub scope: Vec<String>,

    /// Expiration, Unix milliseconds
    pub exp: i64,

    /// Grant reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<String>,

    /// Delegating application
    #[serde(default, rename = "dlg", skip_serializing_if = "Option::is_none")]
    pub delegated_by: Option<String>,

    /// Delegation rights
    #[serde(default)]
    pub delegate: bool,

    /// Public part of the server data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

impl IssuedTicket {
    /// Remaining lifetime at `now`
    pub fn ttl_at(&self, now: i64) -> Duration {
        Duration::from_millis(u64::try_from(self.exp - now).unwrap_or(0))
    }
}

/// Options for [`issue`]
#[derive(Debug, Clone, Default)]
pub struct IssueOptions {
    /// Lifetime override
    pub ttl: Option<Duration>,
    /// Scope override; must fit the app (and grant) scope
    pub scope: Option<Vec<String>>,
    /// Server data
    pub ext: Option<TicketExt>,
    /// Client clock offset, milliseconds
    pub clock_offset: Option<i64>,
    /// Issue the ticket to another application
    pub issue_to: Option<String>,
    /// Delegation rights override; cannot exceed the app's
    pub delegate: Option<bool>,
}

/// Options for [`reissue`]
#[derive(Debug, Clone, Default)]
pub struct ReissueOptions {
    /// Expiry of the attached grant; caps the new expiry
    pub grant_exp: Option<i64>,
    /// Delegate to another application
    pub issue_to: Option<String>,
    /// Narrowed scope
    pub scope: Option<Vec<String>>,
    /// Replacement server data
    pub ext: Option<TicketExt>,
    /// Lifetime override
    pub ttl: Option<Duration>,
    /// Delegation rights override; can only be removed
    pub delegate: Option<bool>,
}

/// Issue a new ticket for `app`, optionally on behalf of `grant`
pub fn issue(
    app: &Application,
    grant: Option<&Grant>,
    password: &Password,
    settings: &Settings,
    options: IssueOptions,
) -> Result<IssuedTicket> {
    if let Some(grant) = grant {
        if grant.app != app.id {
            return Err(OzError::InvalidGrant(
                "Grant belongs to another application".to_string(),
            ));
        }
    }

    let available = grant
        .and_then(|g| g.scope.as_deref())
        .unwrap_or(app.scope.as_slice());
    scope::ensure_subset(available, &app.scope)?;

    let ticket_scope = options.scope.unwrap_or_else(|| available.to_vec());
    scope::validate(&ticket_scope)?;
    scope::ensure_subset(&ticket_scope, available)?;

    if options.delegate == Some(true) && !app.delegate {
        return Err(OzError::DelegationNotAllowed(
            "Application has no delegation rights".to_string(),
        ));
    }

    let (ticket_app, delegated_by) = match options.issue_to {
        Some(target) if target != app.id => {
            if !app.delegate {
                return Err(OzError::DelegationNotAllowed(
                    "Application has no delegation rights".to_string(),
                ));
            }
            (target, Some(app.id.clone()))
        }
        _ => (app.id.clone(), None),
    };

    let now = now_millis();
    let ttl = options
        .ttl
        .or(app.ttl)
        .unwrap_or(settings.ticket.ttl);
    let mut exp = now.saturating_add(duration_ms(ttl));
    if let Some(grant) = grant {
        exp = exp.min(grant.exp);
    }

    let ticket = Ticket {
        id: String::new(),
        exp,
        app: ticket_app,
        user: grant.map(|g| g.user.clone()),
        scope: ticket_scope,
        grant: grant.map(|g| g.id.clone()),
        delegated_by,
        delegate: options.delegate.unwrap_or(app.delegate),
        key: crypto::random_key(settings.ticket.secret_bits)?,
        algorithm: settings.ticket.hmac_algorithm,
        offset: options.clock_offset.unwrap_or(0),
        ext: options.ext.unwrap_or_default(),
    };

    let issued = generate(ticket, password, settings)?;
    tracing::debug!(
        app = %issued.app,
        user = ?issued.user,
        exp = issued.exp,
        "Issued ticket"
    );
    Ok(issued)
}

/// Open a ticket id
pub fn parse(id: &str, password: &Password, settings: &Settings) -> Result<Ticket> {
    let mut ticket: Ticket = envelope::unseal(
        id,
        password,
        &settings.ticket.encryption,
        &settings.ticket.integrity,
    )
    .map_err(|e| OzError::credential(CredentialKind::Ticket, e))?;

    ticket.id = id.to_string();
    Ok(ticket)
}

/// Issue a replacement for `ticket`, refreshing or delegating it.
///
/// Scope can only narrow and delegation rights can only be dropped. When
/// `issue_to` names another application the new ticket records the current
/// holder in `dlg`; a plain refresh keeps both `app` and `dlg`. Grant
/// re-validation is the caller's job, its expiry arrives as `grant_exp`.
pub fn reissue(
    ticket: &Ticket,
    password: &Password,
    settings: &Settings,
    options: ReissueOptions,
) -> Result<IssuedTicket> {
    let new_scope = match options.scope {
        Some(narrowed) => {
            scope::validate(&narrowed)?;
            scope::ensure_subset(&narrowed, &ticket.scope)?;
            narrowed
        }
        None => ticket.scope.clone(),
    };

    if options.delegate == Some(true) && !ticket.delegate {
        return Err(OzError::DelegationNotAllowed(
            "Cannot grant delegation rights the ticket does not have".to_string(),
        ));
    }

    let (app, delegated_by) = match options.issue_to {
        Some(target) if target != ticket.app => {
            if !ticket.delegate {
                return Err(OzError::DelegationNotAllowed(
                    "Ticket does not allow delegation".to_string(),
                ));
            }
            (target, Some(ticket.app.clone()))
        }
        _ => (ticket.app.clone(), ticket.delegated_by.clone()),
    };

    let now = now_millis();
    let ttl = options.ttl.unwrap_or(settings.ticket.ttl);
    let mut exp = now.saturating_add(duration_ms(ttl));
    if let Some(grant_exp) = options.grant_exp {
        exp = exp.min(grant_exp);
    }

    let next = Ticket {
        id: String::new(),
        exp,
        app,
        user: ticket.user.clone(),
        scope: new_scope,
        grant: ticket.grant.clone(),
        delegated_by,
        delegate: options.delegate.unwrap_or(ticket.delegate),
        key: crypto::random_key(settings.ticket.secret_bits)?,
        algorithm: settings.ticket.hmac_algorithm,
        offset: ticket.offset,
        ext: options.ext.unwrap_or_else(|| ticket.ext.clone()),
    };

    let issued = generate(next, password, settings)?;
    tracing::debug!(
        app = %issued.app,
        dlg = ?issued.delegated_by,
        exp = issued.exp,
        "Reissued ticket"
    );
    Ok(issued)
}

fn generate(mut ticket: Ticket, password: &Password, settings: &Settings) -> Result<IssuedTicket> {
    ticket.id = envelope::seal(
        &ticket,
        password,
        &settings.ticket.encryption,
        &settings.ticket.integrity,
    )
    .map_err(|e| OzError::credential(CredentialKind::Ticket, e))?;

    Ok(ticket.issued())
}
