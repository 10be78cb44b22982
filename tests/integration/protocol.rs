use oz_auth::{
    authenticate, client::ClientOptions, config::Settings, now_millis, AuthenticateOptions,
    AuthorizationHeader, EntityMode, ErrorKind, Request, SettingsHandle,
};
use oz_tests::*;
use std::time::Duration;
use tracing_test::traced_test;

fn replace_authorization(request: &Request, edit: impl FnOnce(&mut AuthorizationHeader)) -> Request {
    let mut header = AuthorizationHeader::parse(request.authorization().unwrap()).unwrap();
    edit(&mut header);
    request
        .clone()
        .with_header("Authorization", header.to_header())
}

#[tokio::test]
async fn timestamp_window_edges() {
    let endpoints = endpoints().await;
    let app = app_ticket(&endpoints, "social", SOCIAL_SECRET).await;
    let window = Settings::default().ticket.timestamp_window_ms();

    let ts = now_millis();
    let request = signed(
        "GET",
        "/admin",
        &app,
        ClientOptions {
            ts: Some(ts),
            ..Default::default()
        },
    );

    let skewed = |offset: i64| {
        endpoints.clone().with_options(AuthenticateOptions {
            localtime_offset: offset,
            ..Default::default()
        })
    };

    assert!(skewed(window - 10_000)
        .authenticate(&request, EntityMode::App)
        .await
        .is_ok());
    assert!(skewed(-(window - 10_000))
        .authenticate(&request, EntityMode::App)
        .await
        .is_ok());

    let err = skewed(window + 1_000)
        .authenticate(&request, EntityMode::App)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleTimestamp);

    // Exactly on the edge is stale as well
    let err = skewed(ts + window - now_millis())
        .authenticate(&request, EntityMode::App)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleTimestamp);
}

#[tokio::test]
async fn any_mutation_of_signed_content_fails_the_mac() {
    let endpoints = endpoints().await;
    let app = app_ticket(&endpoints, "social", SOCIAL_SECRET).await;
    let request = signed(
        "GET",
        "/admin?page=1",
        &app,
        ClientOptions {
            ext: Some("ext".to_string()),
            ..Default::default()
        },
    );
    endpoints
        .authenticate(&request, EntityMode::App)
        .await
        .unwrap();

    let mut method = request.clone();
    method.method = "POST".to_string();
    let mut resource = request.clone();
    resource.url = "/admin?page=2".to_string();
    let host = request.clone().with_header("Host", "example.org:8080");
    let port = request.clone().with_header("Host", "example.com:8081");
    let ext = replace_authorization(&request, |h| h.attributes.ext = Some("other".into()));
    let no_ext = replace_authorization(&request, |h| h.attributes.ext = None);
    let ts = replace_authorization(&request, |h| h.attributes.ts += 1);
    let mac = replace_authorization(&request, |h| h.attributes.mac.insert(0, 'A'));

    for mutated in [method, resource, host, port, ext, no_ext, ts, mac] {
        let err = endpoints
            .authenticate(&mutated, EntityMode::App)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMac, "{:?}", mutated);
    }
}

#[tokio::test]
async fn header_attributes_are_strict() {
    let endpoints = endpoints().await;
    let app = app_ticket(&endpoints, "social", SOCIAL_SECRET).await;
    let request = signed("GET", "/admin", &app, ClientOptions::default());
    let header = request.authorization().unwrap().to_string();

    for bad in [
        format!("{}, nonce=\"abc\"", header),
        format!("{}, ts=\"1\"", header),
        header.replacen("Oz ", "Hawk ", 1),
        header.replacen(", mac=", " mac=", 1),
    ] {
        let err = endpoints
            .authenticate(
                &request.clone().with_header("Authorization", bad),
                EntityMode::Any,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    let mismatched = replace_authorization(&request, |h| {
        h.ticket = oz_auth::TicketReference::Id {
            id: h.ticket.ticket_id().to_string(),
            app: "network".to_string(),
        }
    });
    let err = endpoints
        .authenticate(&mismatched, EntityMode::Any)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MismatchedApplication);
}

#[tokio::test]
async fn proxy_host_header() {
    let endpoints = endpoints().await.with_options(AuthenticateOptions {
        host_header_name: Some("X-Forwarded-Host".to_string()),
        ..Default::default()
    });
    let app = app_ticket(&endpoints, "social", SOCIAL_SECRET).await;

    let request = signed("GET", "/admin", &app, ClientOptions::default())
        .with_header("Host", "internal:3000")
        .with_header("X-Forwarded-Host", HOST);
    endpoints
        .authenticate(&request, EntityMode::App)
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn settings_update_during_traffic() {
    let handle = SettingsHandle::default();
    let endpoints = endpoints_with(handle.clone()).await;
    let app = app_ticket(&endpoints, "social", SOCIAL_SECRET).await;

    let mut tasks = Vec::new();
    for i in 0..16 {
        let endpoints = endpoints.clone();
        let request = signed("GET", &format!("/admin?n={}", i), &app, ClientOptions::default());
        tasks.push(tokio::spawn(async move {
            endpoints.authenticate(&request, EntityMode::App).await
        }));
    }

    let mut next = Settings::default();
    next.ticket.ttl = Duration::from_secs(10 * 60);
    handle.update(next).unwrap();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let refreshed = app_ticket(&endpoints, "social", SOCIAL_SECRET).await;
    assert!(refreshed.exp <= now_millis() + 10 * 60 * 1000);
}

#[test]
#[traced_test]
fn failures_are_logged_by_kind_only() {
    let settings = Settings::default();
    let app = oz_auth::Application::new("social", SOCIAL_SECRET, scope(&["a"])).unwrap();
    let issued = oz_auth::ticket::issue(
        &app,
        None,
        &password(),
        &settings,
        oz_auth::ticket::IssueOptions::default(),
    )
    .unwrap();

    let request = signed("GET", "/admin", &issued, ClientOptions::default())
        .with_header("Host", "example.com:9999");
    let err = authenticate(&request, &password(), &settings, &AuthenticateOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidMac);

    assert!(logs_contain("Request authentication failed"));
    assert!(logs_contain("InvalidMac"));
    assert!(!logs_contain(&issued.key));
}
