//! Common test utilities shared across integration and E2E tests

use base64::{engine::general_purpose::STANDARD, Engine as _};
use oz_auth::{
    client::{self, ClientOptions},
    Application, Endpoints, Grant, IssuedTicket, MacCredentials, MemoryStore, Password, Request,
    RsvpPayload, SettingsHandle,
};
use std::sync::Arc;

/// Sealing password used by every fixture
pub const PASSWORD: &str = "some_not_random_password_that_is_also_long_enough";

/// Host the signed requests are addressed to
pub const HOST: &str = "example.com:8080";

/// Secret of the `social` application
pub const SOCIAL_SECRET: &str = "social-secret";

/// Secret of the `network` application
pub const NETWORK_SECRET: &str = "network-secret";

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Fixture password
pub fn password() -> Password {
    Password::new(PASSWORD).expect("fixture password is long enough")
}

/// Owned scope entries
pub fn scope(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|s| s.to_string()).collect()
}

/// Endpoints over a store holding `social` (delegating, scope a/b/c) and
/// `network` (scope a/b, no delegation rights)
pub async fn endpoints() -> Endpoints<MemoryStore> {
    endpoints_with(SettingsHandle::default()).await
}

/// Same as [`endpoints`] with the given settings
pub async fn endpoints_with(settings: SettingsHandle) -> Endpoints<MemoryStore> {
    let store = MemoryStore::new();
    store
        .insert_app(
            Application::new("social", SOCIAL_SECRET, scope(&["a", "b", "c"]))
                .expect("valid app")
                .with_delegation(),
        )
        .await;
    store
        .insert_app(
            Application::new("network", NETWORK_SECRET, scope(&["a", "b"])).expect("valid app"),
        )
        .await;

    Endpoints::new(Arc::new(store), password(), settings)
}

/// Request carrying Basic application credentials
pub fn basic(id: &str, secret: &str) -> Request {
    Request::new("POST", "/oz/app")
        .with_header("Host", HOST)
        .with_header(
            "Authorization",
            format!("Basic {}", STANDARD.encode(format!("{}:{}", id, secret))),
        )
}

/// Request to `path` signed with `ticket`
pub fn signed(method: &str, path: &str, ticket: &IssuedTicket, options: ClientOptions) -> Request {
    let url = format!("http://{}{}", HOST, path);
    let header = client::header(&url, method, &MacCredentials::from(ticket), &options)
        .expect("client header");

    Request::new(method, path)
        .with_header("Host", HOST)
        .with_header("Authorization", header.field)
}

/// Grant for `user` to `app`, valid for `ttl_ms`
pub fn grant(app: &str, user: &str, ttl_ms: i64) -> Grant {
    Grant::new(app, user, oz_auth::now_millis() + ttl_ms).expect("valid grant")
}

/// App ticket for `app` obtained through the app endpoint
pub async fn app_ticket(
    endpoints: &Endpoints<MemoryStore>,
    app: &str,
    secret: &str,
) -> IssuedTicket {
    endpoints
        .app(&basic(app, secret))
        .await
        .expect("app ticket")
}

/// Store `grant` and run the RSVP exchange for its application
pub async fn user_ticket(
    endpoints: &Endpoints<MemoryStore>,
    grant: &Grant,
    secret: &str,
) -> oz_auth::Result<IssuedTicket> {
    endpoints.store().insert_grant(grant.clone(), None).await;
    let app = app_ticket(endpoints, &grant.app, secret).await;
    let rsvp = endpoints.issue_rsvp(grant).await?;

    endpoints
        .rsvp(
            &signed("POST", "/oz/rsvp", &app, ClientOptions::default()),
            &RsvpPayload { rsvp },
        )
        .await
}
