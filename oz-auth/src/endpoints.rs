//! Endpoint Orchestrator
//!
//! Composes the protocol into the flow a resource server exposes:
//!
//! ```text
//! Basic id:secret ──app()──▶ app ticket
//! app ticket + RSVP ──rsvp()──▶ user ticket
//! any ticket ──reissue()──▶ refreshed, narrowed or delegated ticket
//! any ticket ──authenticate(mode)──▶ (Ticket, RequestAttributes)
//! ```
//!
//! Every call takes one settings snapshot and keeps it to the end. Key
//! derivation and sealing run on the blocking pool.

use crate::{
    application::Application,
    authenticator,
    config::{Settings, SettingsHandle},
    crypto,
    envelope::Password,
    error::{OzError, Result},
    grant::Grant,
    header::RequestAttributes,
    now_millis,
    request::{AuthenticateOptions, Request},
    rsvp,
    store::Store,
    ticket::{self, IssueOptions, IssuedTicket, ReissueOptions, Ticket, TicketExt},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ticket class an endpoint accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityMode {
    /// App or user tickets
    #[default]
    Any,
    /// User tickets only
    User,
    /// App tickets only
    App,
}

impl EntityMode {
    fn check(self, ticket: &Ticket) -> Result<()> {
        match (self, ticket.is_user_ticket()) {
            (EntityMode::User, false) => Err(OzError::InvalidEntity(
                "User ticket required".to_string(),
            )),
            (EntityMode::App, true) => Err(OzError::InvalidEntity(
                "Application ticket required".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Body of the RSVP exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsvpPayload {
    /// Sealed RSVP
    pub rsvp: String,
}

/// Body of a reissue request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReissuePayload {
    /// Delegate to this application
    #[serde(default, alias = "issueTo", skip_serializing_if = "Option::is_none")]
    pub issue_to: Option<String>,

    /// Narrowed scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,
}

/// Oz endpoints over a collaborator store
pub struct Endpoints<S: Store> {
    store: Arc<S>,
    password: Arc<Password>,
    settings: SettingsHandle,
    options: AuthenticateOptions,
}

impl<S: Store> Clone for Endpoints<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            password: Arc::clone(&self.password),
            settings: self.settings.clone(),
            options: self.options.clone(),
        }
    }
}

impl<S: Store> Endpoints<S> {
    /// Create endpoints with default authentication options
    pub fn new(store: Arc<S>, password: Password, settings: SettingsHandle) -> Self {
        Self {
            store,
            password: Arc::new(password),
            settings,
            options: AuthenticateOptions::default(),
        }
    }

    /// Override how requests are authenticated
    pub fn with_options(mut self, options: AuthenticateOptions) -> Self {
        self.options = options;
        self
    }

    /// Settings shared with this instance
    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// Collaborator store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Exchange Basic application credentials for an app ticket
    pub async fn app(&self, request: &Request) -> Result<IssuedTicket> {
        let settings = self.settings.snapshot();
        let (id, secret) = basic_credentials(request.authorization()?)?;

        let app = self
            .store
            .load_app(&id)
            .await?
            .ok_or_else(|| OzError::InvalidClient("Unknown application".to_string()))?;
        if !crypto::constant_time_eq(app.secret.as_bytes(), secret.as_bytes()) {
            return Err(OzError::InvalidClient(
                "Invalid application credentials".to_string(),
            ));
        }

        let password = Arc::clone(&self.password);
        let issued = blocking(move || {
            ticket::issue(&app, None, &password, &settings, IssueOptions::default())
        })
        .await?;

        tracing::info!(app = %issued.app, "App ticket issued");
        Ok(issued)
    }

    /// Exchange an RSVP for a user ticket; the request must carry an app ticket
    pub async fn rsvp(&self, request: &Request, payload: &RsvpPayload) -> Result<IssuedTicket> {
        let settings = self.settings.snapshot();
        let (app_ticket, _) = self
            .authenticate_with(request, EntityMode::App, &settings)
            .await?;

        let password = Arc::clone(&self.password);
        let sealed = payload.rsvp.clone();
        let snapshot = Arc::clone(&settings);
        let rsvp = blocking(move || rsvp::parse(&sealed, &password, &snapshot)).await?;

        if rsvp.is_expired_at(now_millis()) {
            return Err(OzError::ExpiredCredential("rsvp".to_string()));
        }
        if rsvp.app != app_ticket.app {
            return Err(OzError::MismatchedApplication(
                "RSVP was issued to another application".to_string(),
            ));
        }

        let (grant, ext) = self
            .store
            .load_grant(&rsvp.grant)
            .await?
            .ok_or_else(|| OzError::InvalidGrant("Grant not found".to_string()))?;
        if grant.app != rsvp.app {
            return Err(OzError::InvalidGrant(
                "Grant belongs to another application".to_string(),
            ));
        }
        if grant.is_expired_at(now_millis()) {
            return Err(OzError::InvalidGrant("Grant expired".to_string()));
        }

        let app = self
            .store
            .load_app(&rsvp.app)
            .await?
            .ok_or_else(|| OzError::InvalidClient("Unknown application".to_string()))?;

        let password = Arc::clone(&self.password);
        let issued = blocking(move || {
            ticket::issue(
                &app,
                Some(&grant),
                &password,
                &settings,
                IssueOptions {
                    ext,
                    ..Default::default()
                },
            )
        })
        .await?;

        tracing::info!(app = %issued.app, "User ticket issued");
        Ok(issued)
    }

    /// Refresh, narrow or delegate the ticket the request is signed with
    pub async fn reissue(
        &self,
        request: &Request,
        payload: &ReissuePayload,
    ) -> Result<IssuedTicket> {
        let settings = self.settings.snapshot();
        let (ticket, _) = self
            .authenticate_with(request, EntityMode::Any, &settings)
            .await?;

        // The grant lookup's current ext replaces what was sealed at issuance
        let (grant_exp, ext) = match &ticket.grant {
            Some(grant_id) => {
                let (grant, ext) = self.check_grant(grant_id, &ticket).await?;
                (Some(grant.exp), ext)
            }
            None => (None, None),
        };

        let password = Arc::clone(&self.password);
        let options = ReissueOptions {
            grant_exp,
            issue_to: payload.issue_to.clone(),
            scope: payload.scope.clone(),
            ext,
            ..Default::default()
        };
        let issued = blocking(move || ticket::reissue(&ticket, &password, &settings, options))
            .await?;

        tracing::info!(app = %issued.app, dlg = ?issued.delegated_by, "Ticket reissued");
        Ok(issued)
    }

    /// Authenticate a protected-resource request
    pub async fn authenticate(
        &self,
        request: &Request,
        mode: EntityMode,
    ) -> Result<(Ticket, RequestAttributes)> {
        let settings = self.settings.snapshot();
        self.authenticate_with(request, mode, &settings).await
    }

    /// Seal an RSVP for `grant` after the user consented
    pub async fn issue_rsvp(&self, grant: &Grant) -> Result<String> {
        let settings = self.settings.snapshot();
        let app: Application = self
            .store
            .load_app(&grant.app)
            .await?
            .ok_or_else(|| OzError::InvalidClient("Unknown application".to_string()))?;

        let password = Arc::clone(&self.password);
        let grant = grant.clone();
        blocking(move || rsvp::issue(&app, &grant, &password, &settings)).await
    }

    async fn authenticate_with(
        &self,
        request: &Request,
        mode: EntityMode,
        settings: &Arc<Settings>,
    ) -> Result<(Ticket, RequestAttributes)> {
        let password = Arc::clone(&self.password);
        let settings = Arc::clone(settings);
        let options = self.options.clone();
        let request = request.clone();

        let (ticket, attributes) = blocking(move || {
            authenticator::authenticate(&request, &password, &settings, &options)
        })
        .await?;

        mode.check(&ticket)?;
        Ok((ticket, attributes))
    }

    async fn check_grant(
        &self,
        grant_id: &str,
        ticket: &Ticket,
    ) -> Result<(Grant, Option<TicketExt>)> {
        let (grant, ext) = self
            .store
            .load_grant(grant_id)
            .await?
            .ok_or_else(|| OzError::InvalidGrant("Grant not found".to_string()))?;

        if grant.is_expired_at(now_millis()) {
            return Err(OzError::InvalidGrant("Grant expired".to_string()));
        }
        if ticket.user.as_deref() != Some(grant.user.as_str()) {
            return Err(OzError::InvalidGrant(
                "Grant belongs to another user".to_string(),
            ));
        }
        // Delegated tickets changed app; the sealed grant reference is trusted
        if ticket.delegated_by.is_none() && grant.app != ticket.app {
            return Err(OzError::InvalidGrant(
                "Grant belongs to another application".to_string(),
            ));
        }

        Ok((grant, ext))
    }
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Decode `Basic base64(id:secret)`
pub fn basic_credentials(header: &str) -> Result<(String, String)> {
    let malformed = || OzError::InvalidRequest("Bad basic authentication header".to_string());

    let (scheme, encoded) = header.trim().split_once(' ').ok_or_else(malformed)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(malformed());
    }

    let decoded = STANDARD.decode(encoded.trim()).map_err(|_| malformed())?;
    let decoded = String::from_utf8(decoded).map_err(|_| malformed())?;
    let (id, secret) = decoded.split_once(':').ok_or_else(malformed)?;
    if id.is_empty() || secret.is_empty() {
        return Err(malformed());
    }

    Ok((id.to_string(), secret.to_string()))
}
