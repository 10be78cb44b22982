use actix_web::{body::MessageBody, http::StatusCode, ResponseError};
use oz_auth::{CredentialKind, OzError, SealError};

fn body_json(err: &OzError) -> serde_json::Value {
    let body = err.error_response().into_body().try_into_bytes().unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[test]
fn unauthorized_responses_challenge_with_scheme() {
    let err = OzError::InvalidMac;
    let response = err.error_response();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("WWW-Authenticate").unwrap(),
        oz_auth::SCHEME
    );
    assert_eq!(
        body_json(&err),
        serde_json::json!({"error": "invalid_mac", "message": "Bad mac"})
    );
}

#[test]
fn credential_failures_do_not_leak_detail() {
    let err = OzError::credential(
        CredentialKind::Ticket,
        SealError::Deserialization("missing field `key`".to_string()),
    );
    let body = body_json(&err);

    assert_eq!(body["error"], "invalid_credential");
    assert_eq!(body["message"], "Invalid credential");
    assert!(!body.to_string().contains("key"));
}

#[test]
fn status_codes_by_kind() {
    let cases = [
        (OzError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
        (OzError::InvalidScope("x".into()), StatusCode::BAD_REQUEST),
        (OzError::InvalidEntity("x".into()), StatusCode::FORBIDDEN),
        (OzError::InvalidGrant("x".into()), StatusCode::FORBIDDEN),
        (OzError::LookupFailed("x".into()), StatusCode::BAD_GATEWAY),
        (OzError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];

    for (err, status) in cases {
        let response = err.error_response();
        assert_eq!(response.status(), status, "{}", err);
        assert!(response.headers().get("WWW-Authenticate").is_none());
    }
}
