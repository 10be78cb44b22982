//! Request Authenticator
//!
//! Binds a ticket to one HTTP request. The client MACs a canonical string
//! built from the ticket, its own attributes and the request target with the
//! per-ticket key; the server reopens the ticket, recomputes the MAC and
//! enforces the replay window and expiry.

use crate::{
    config::Settings,
    crypto::{self, MacAlgorithm},
    envelope::Password,
    error::{OzError, Result},
    header::{AuthorizationHeader, RequestAttributes},
    now_millis,
    request::{AuthenticateOptions, Request, RequestTarget},
    ticket::{self, IssuedTicket, Ticket},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

/// Everything needed to sign or verify a request MAC
#[derive(Clone, Copy)]
pub struct MacCredentials<'a> {
    /// Sealed ticket id
    pub id: &'a str,
    /// Ticket holder
    pub app: &'a str,
    /// Delegating application
    pub delegated_by: Option<&'a str>,
    /// Per-ticket key
    pub key: &'a str,
    /// Per-ticket algorithm
    pub algorithm: MacAlgorithm,
}

impl std::fmt::Debug for MacCredentials<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacCredentials")
            .field("app", &self.app)
            .field("delegated_by", &self.delegated_by)
            .field("key", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl<'a> From<&'a Ticket> for MacCredentials<'a> {
    fn from(ticket: &'a Ticket) -> Self {
        Self {
            id: &ticket.id,
            app: &ticket.app,
            delegated_by: ticket.delegated_by.as_deref(),
            key: &ticket.key,
            algorithm: ticket.algorithm,
        }
    }
}

impl<'a> From<&'a IssuedTicket> for MacCredentials<'a> {
    fn from(ticket: &'a IssuedTicket) -> Self {
        Self {
            id: &ticket.id,
            app: &ticket.app,
            delegated_by: ticket.delegated_by.as_deref(),
            key: &ticket.key,
            algorithm: ticket.algorithm,
        }
    }
}

/// Canonical string covered by the MAC, every line newline-terminated
pub fn normalized_string(
    target: &RequestTarget,
    ts: i64,
    ext: Option<&str>,
    credentials: &MacCredentials<'_>,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
        credentials.id,
        credentials.app,
        credentials.delegated_by.unwrap_or_default(),
        ts,
        target.method,
        target.resource,
        target.host,
        target.port,
        ext.unwrap_or_default(),
    )
}

/// Request MAC, base64url without padding
pub fn compute_mac(
    target: &RequestTarget,
    ts: i64,
    ext: Option<&str>,
    credentials: &MacCredentials<'_>,
) -> String {
    let normalized = normalized_string(target, ts, ext, credentials);
    let tag = credentials
        .algorithm
        .sign(credentials.key.as_bytes(), normalized.as_bytes());
    URL_SAFE_NO_PAD.encode(tag)
}

/// Recompute the MAC and compare in constant time
pub fn verify_mac(
    target: &RequestTarget,
    attributes: &RequestAttributes,
    credentials: &MacCredentials<'_>,
) -> bool {
    let expected = compute_mac(
        target,
        attributes.ts,
        attributes.ext.as_deref(),
        credentials,
    );
    crypto::constant_time_eq(expected.as_bytes(), attributes.mac.as_bytes())
}

/// Authenticate a request, returning the opened ticket and the request attributes
pub fn authenticate(
    request: &Request,
    password: &Password,
    settings: &Settings,
    options: &AuthenticateOptions,
) -> Result<(Ticket, RequestAttributes)> {
    verify_request(request, password, settings, options).inspect_err(|err| {
        tracing::debug!(kind = ?err.kind(), "Request authentication failed");
    })
}

fn verify_request(
    request: &Request,
    password: &Password,
    settings: &Settings,
    options: &AuthenticateOptions,
) -> Result<(Ticket, RequestAttributes)> {
    let now = now_millis().saturating_add(options.localtime_offset);

    let header = AuthorizationHeader::parse(request.authorization()?)?;
    let target = request.target(options)?;
    let ticket = ticket::parse(header.ticket.ticket_id(), password, settings)?;

    if let Some(app) = header.ticket.asserted_app() {
        if app != ticket.app {
            return Err(OzError::MismatchedApplication(
                "Header app does not match ticket".to_string(),
            ));
        }
    }

    // The embedded form cannot carry dlg; the ticket's own value is signed
    let attributes = header.attributes;
    if header.ticket.asserted_app().is_some() && attributes.dlg != ticket.delegated_by {
        return Err(OzError::MismatchedApplication(
            "Header dlg does not match ticket".to_string(),
        ));
    }

    if !verify_mac(&target, &attributes, &MacCredentials::from(&ticket)) {
        return Err(OzError::InvalidMac);
    }

    let window = settings.ticket.timestamp_window_ms();
    let skew = now
        .saturating_sub(ticket.offset)
        .saturating_sub(attributes.ts);
    if skew.saturating_abs() >= window {
        return Err(OzError::StaleTimestamp { skew, window });
    }

    if ticket.is_expired_at(now) {
        return Err(OzError::ExpiredCredential("ticket".to_string()));
    }

    Ok((ticket, attributes))
}
