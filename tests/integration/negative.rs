use assert_matches::assert_matches;
use oz_auth::{
    client::ClientOptions, config::Settings, ErrorKind, OzError, ReissuePayload, RsvpPayload,
    SettingsHandle,
};
use oz_tests::*;
use std::time::Duration;

#[tokio::test]
async fn rsvp_presented_by_another_app() {
    let endpoints = endpoints().await;
    let grant = grant("network", "john", 60_000);
    endpoints.store().insert_grant(grant.clone(), None).await;
    let rsvp = endpoints.issue_rsvp(&grant).await.unwrap();

    let social = app_ticket(&endpoints, "social", SOCIAL_SECRET).await;
    let err = endpoints
        .rsvp(
            &signed("POST", "/oz/rsvp", &social, ClientOptions::default()),
            &RsvpPayload { rsvp },
        )
        .await
        .unwrap_err();
    assert_matches!(err, OzError::MismatchedApplication(_));
}

#[tokio::test]
async fn rsvp_for_expired_grant() {
    let endpoints = endpoints().await;
    let grant = grant("social", "john", -1_000);

    let err = user_ticket(&endpoints, &grant, SOCIAL_SECRET)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidGrant);
}

#[tokio::test]
async fn rsvp_for_missing_grant() {
    let endpoints = endpoints().await;
    let grant = grant("social", "john", 60_000);
    let rsvp = endpoints.issue_rsvp(&grant).await.unwrap();

    let social = app_ticket(&endpoints, "social", SOCIAL_SECRET).await;
    let err = endpoints
        .rsvp(
            &signed("POST", "/oz/rsvp", &social, ClientOptions::default()),
            &RsvpPayload { rsvp },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidGrant);
}

#[tokio::test]
async fn expired_rsvp() {
    let mut settings = Settings::default();
    settings.rsvp.ttl = Duration::from_millis(1);
    let endpoints = endpoints_with(SettingsHandle::new(settings).unwrap()).await;

    let grant = grant("social", "john", 60_000);
    endpoints.store().insert_grant(grant.clone(), None).await;
    let rsvp = endpoints.issue_rsvp(&grant).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let social = app_ticket(&endpoints, "social", SOCIAL_SECRET).await;
    let err = endpoints
        .rsvp(
            &signed("POST", "/oz/rsvp", &social, ClientOptions::default()),
            &RsvpPayload { rsvp },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExpiredCredential);
}

#[tokio::test]
async fn tampered_rsvp() {
    let endpoints = endpoints().await;
    let social = app_ticket(&endpoints, "social", SOCIAL_SECRET).await;

    let err = endpoints
        .rsvp(
            &signed("POST", "/oz/rsvp", &social, ClientOptions::default()),
            &RsvpPayload {
                rsvp: "a:b:c:d:e".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityFailure);
    assert_eq!(err.code(), "invalid_credential");
}

#[tokio::test]
async fn user_ticket_at_app_only_endpoint() {
    let endpoints = endpoints().await;
    let grant = grant("social", "john", 60_000);
    let user = user_ticket(&endpoints, &grant, SOCIAL_SECRET).await.unwrap();
    let rsvp = endpoints.issue_rsvp(&grant).await.unwrap();

    let err = endpoints
        .rsvp(
            &signed("POST", "/oz/rsvp", &user, ClientOptions::default()),
            &RsvpPayload { rsvp },
        )
        .await
        .unwrap_err();
    assert_matches!(err, OzError::InvalidEntity(_));
}

#[tokio::test]
async fn bad_basic_credentials() {
    let endpoints = endpoints().await;

    let err = endpoints
        .app(&basic("social", NETWORK_SECRET))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidClient);

    let missing = oz_auth::Request::new("POST", "/oz/app").with_header("Host", HOST);
    let err = endpoints.app(&missing).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn delegation_without_rights() {
    let endpoints = endpoints().await;
    let grant = grant("network", "john", 60_000);
    let user = user_ticket(&endpoints, &grant, NETWORK_SECRET).await.unwrap();
    assert!(!user.delegate);

    let err = endpoints
        .reissue(
            &signed("POST", "/oz/reissue", &user, ClientOptions::default()),
            &ReissuePayload {
                issue_to: Some("social".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, OzError::DelegationNotAllowed(_));
}

#[tokio::test]
async fn reissue_cannot_widen_scope() {
    let endpoints = endpoints().await;
    let app = app_ticket(&endpoints, "network", NETWORK_SECRET).await;

    let err = endpoints
        .reissue(
            &signed("POST", "/oz/reissue", &app, ClientOptions::default()),
            &ReissuePayload {
                scope: Some(scope(&["a", "c"])),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidScope);
}

#[tokio::test]
async fn ticket_sealed_with_another_password() {
    let endpoints = endpoints().await;
    let other = oz_auth::Endpoints::new(
        std::sync::Arc::new(oz_auth::MemoryStore::new()),
        oz_auth::Password::new("a_completely_different_password_of_enough_length").unwrap(),
        SettingsHandle::default(),
    );
    other
        .store()
        .insert_app(
            oz_auth::Application::new("social", SOCIAL_SECRET, scope(&["a"])).unwrap(),
        )
        .await;
    let foreign = app_ticket(&other, "social", SOCIAL_SECRET).await;

    let err = endpoints
        .authenticate(
            &signed("GET", "/admin", &foreign, ClientOptions::default()),
            oz_auth::EntityMode::Any,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityFailure);
}
