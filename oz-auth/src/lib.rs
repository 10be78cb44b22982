//! # oz-auth: Oz delegated authorization
//!
//! Ticket-based authorization for resource servers. Client applications
//! receive sealed, time-bounded tickets, optionally on behalf of a user,
//! sign each HTTP request with the per-ticket key, and can have tickets
//! reissued, narrowed or delegated to other applications.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐  Basic id:secret   ┌──────────────────┐
//! │  CLIENT APP  │ ─────────────────▶ │  /oz/app         │ ──▶ app ticket
//! └──────────────┘                    └──────────────────┘
//!        │  user consents, server seals an RSVP for the grant
//!        ▼
//! ┌──────────────┐  app ticket + RSVP ┌──────────────────┐
//! │  CLIENT APP  │ ─────────────────▶ │  /oz/rsvp        │ ──▶ user ticket
//! └──────────────┘                    └──────────────────┘
//!        │
//!        ▼
//! ┌──────────────┐  any ticket        ┌──────────────────┐
//! │  CLIENT APP  │ ─────────────────▶ │  /oz/reissue     │ ──▶ refreshed or
//! └──────────────┘  [issue_to, scope] └──────────────────┘     delegated ticket
//! ```
//!
//! Tickets are stateless: the ticket id is the sealed record itself
//! (see [`envelope`]), reopened on every request.
//!
//! ## Example
//!
//! ```no_run
//! use oz_auth::{
//!     client::{self, ClientOptions},
//!     config::Settings,
//!     ticket::{self, IssueOptions},
//!     Application, MacCredentials, Password,
//! };
//!
//! # fn main() -> oz_auth::Result<()> {
//! let password = Password::new("a_password_that_is_at_least_32_characters")?;
//! let settings = Settings::default();
//! let app = Application::new("social", "secret", vec!["read".to_string()])?;
//!
//! let issued = ticket::issue(&app, None, &password, &settings, IssueOptions::default())?;
//! let signed = client::header(
//!     "https://api.example.com/resource",
//!     "GET",
//!     &MacCredentials::from(&issued),
//!     &ClientOptions::default(),
//! )?;
//! println!("Authorization: {}", signed.field);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod application;
pub mod authenticator;
pub mod client;
pub mod config;
pub mod crypto;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod grant;
pub mod header;
pub mod request;
pub mod rsvp;
pub mod scope;
pub mod store;
pub mod ticket;

// Re-exports for convenience
pub use application::Application;
pub use authenticator::{authenticate, MacCredentials};
pub use config::{Settings, SettingsHandle};
pub use crypto::{CipherAlgorithm, MacAlgorithm};
pub use endpoints::{EntityMode, Endpoints, ReissuePayload, RsvpPayload};
pub use envelope::Password;
pub use error::{CredentialKind, ErrorKind, OzError, Result, SealError};
pub use grant::Grant;
pub use header::{AuthorizationHeader, RequestAttributes, TicketReference};
pub use request::{AuthenticateOptions, Request, RequestTarget};
pub use rsvp::Rsvp;
pub use store::{MemoryStore, Store};
pub use ticket::{IssuedTicket, Ticket, TicketExt};

/// Authorization scheme name
pub const SCHEME: &str = "Oz";

/// Current time, Unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
