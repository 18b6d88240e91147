mod common;

use std::time::{Duration, SystemTime};

use serde_json::json;
use spotremote::{error::ErrorKind, remote::Remote, store::FileStore};
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

use common::{SESSION, config, config_with_accounts, remote, seed, token_body};

#[tokio::test]
async fn auth_url_carries_client_and_scope() {
    let server = MockServer::start().await;
    let remote = remote(&config(&server));

    let url = remote.auth_url().unwrap();
    assert_eq!(url.path(), "/authorize");

    let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(query.contains(&("response_type".to_owned(), "code".to_owned())));
    assert!(query.contains(&("client_id".to_owned(), "client-id".to_owned())));
    assert!(query.contains(&(
        "redirect_uri".to_owned(),
        "http://127.0.0.1:8000/spotify/redirect".to_owned()
    )));
    assert!(query
        .iter()
        .any(|(key, value)| key == "scope" && value.contains("user-modify-playback-state")));
}

#[tokio::test]
async fn exchange_code_stores_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("access-1", Some("refresh-1"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let remote = remote(&config(&server));
    remote.exchange_code_for_token(SESSION, "the-code").await.unwrap();

    let record = remote.tokens().get(SESSION).unwrap().unwrap();
    assert_eq!(record.access_token, "access-1");
    assert_eq!(record.refresh_token, "refresh-1");
    assert!(record.time_to_live() > Duration::from_secs(3500));
    assert!(remote.is_authenticated(SESSION).await);
}

#[tokio::test]
async fn exchange_code_rejects_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid authorization code"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let remote = remote(&config(&server));
    let e = remote
        .exchange_code_for_token(SESSION, "stale")
        .await
        .unwrap_err();

    assert_eq!(e.kind, ErrorKind::Authentication);
    assert!(remote.tokens().get(SESSION).unwrap().is_none());
}

#[tokio::test]
async fn exchange_code_requires_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", None)))
        .mount(&server)
        .await;

    let remote = remote(&config(&server));
    let e = remote
        .exchange_code_for_token(SESSION, "the-code")
        .await
        .unwrap_err();

    assert_eq!(e.kind, ErrorKind::Authentication);
    assert!(remote.tokens().get(SESSION).unwrap().is_none());
}

#[tokio::test]
async fn exchange_code_rejects_absurd_lifetime() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a",
            "expires_in": u64::MAX,
            "refresh_token": "r"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let remote = remote(&config(&server));
    let e = remote
        .exchange_code_for_token(SESSION, "the-code")
        .await
        .unwrap_err();

    assert_eq!(e.kind, ErrorKind::Parse);
    assert!(remote.tokens().get(SESSION).unwrap().is_none());
}

#[tokio::test]
async fn expired_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2", None)))
        .expect(1)
        .mount(&server)
        .await;

    let remote = remote(&config(&server));
    seed(&remote, "access-1", Duration::ZERO);

    assert!(remote.is_authenticated(SESSION).await);

    let record = remote.tokens().get(SESSION).unwrap().unwrap();
    assert_eq!(record.access_token, "access-2");
    assert!(record.expires_at > SystemTime::now());
}

#[tokio::test]
async fn refresh_keeps_refresh_token_unless_rotated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2", None)))
        .mount(&server)
        .await;

    let remote = remote(&config(&server));
    seed(&remote, "access-1", Duration::ZERO);
    assert!(remote.is_authenticated(SESSION).await);
    assert_eq!(
        remote.tokens().get(SESSION).unwrap().unwrap().refresh_token,
        "refresh-1"
    );
}

#[tokio::test]
async fn rotated_refresh_token_is_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("access-2", Some("refresh-2"))),
        )
        .mount(&server)
        .await;

    let remote = remote(&config(&server));
    seed(&remote, "access-1", Duration::ZERO);
    assert!(remote.is_authenticated(SESSION).await);
    assert_eq!(
        remote.tokens().get(SESSION).unwrap().unwrap().refresh_token,
        "refresh-2"
    );
}

#[tokio::test]
async fn bad_request_deletes_tokens_without_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .expect(1)
        .mount(&server)
        .await;

    let remote = remote(&config(&server));
    seed(&remote, "access-1", Duration::ZERO);

    assert!(!remote.is_authenticated(SESSION).await);
    assert!(remote.tokens().get(SESSION).unwrap().is_none());

    // Nothing left to refresh.
    assert!(!remote.is_authenticated(SESSION).await);
}

#[tokio::test]
async fn invalid_token_description_deletes_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid refresh token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let remote = remote(&config(&server));
    seed(&remote, "access-1", Duration::ZERO);

    assert!(!remote.is_authenticated(SESSION).await);
    assert!(remote.tokens().get(SESSION).unwrap().is_none());
}

#[tokio::test]
async fn other_error_descriptions_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "server_error",
            "error_description": "Temporarily unavailable"
        })))
        .expect(3)
        .mount(&server)
        .await;

    let remote = remote(&config(&server));
    seed(&remote, "access-1", Duration::ZERO);

    assert!(!remote.is_authenticated(SESSION).await);

    let record = remote.tokens().get(SESSION).unwrap().unwrap();
    assert_eq!(record.access_token, "access-1");
}

#[tokio::test]
async fn server_errors_are_retried_and_keep_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let remote = remote(&config(&server));
    seed(&remote, "access-1", Duration::ZERO);

    assert!(!remote.is_authenticated(SESSION).await);
    assert!(remote.tokens().get(SESSION).unwrap().is_some());
}

#[tokio::test]
async fn network_failures_keep_tokens() {
    let server = MockServer::start().await;
    let config = config_with_accounts(&server, common::closed_port_url());
    let remote = remote(&config);
    seed(&remote, "access-1", Duration::ZERO);

    assert!(!remote.is_authenticated(SESSION).await);

    let record = remote.tokens().get(SESSION).unwrap().unwrap();
    assert_eq!(record.access_token, "access-1");

    let status = remote.token_status(SESSION).await.unwrap();
    assert!(!status.authenticated);
}

#[tokio::test]
async fn unknown_session_is_not_authenticated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access", None)))
        .expect(0)
        .mount(&server)
        .await;

    let remote = remote(&config(&server));
    assert!(!remote.is_authenticated("nobody").await);
}

#[tokio::test]
async fn token_status_reports_lifetime() {
    let server = MockServer::start().await;
    let remote = remote(&config(&server));
    seed(&remote, "access-1", Duration::from_secs(600));

    let status = remote.token_status(SESSION).await.unwrap();
    assert!(status.authenticated);
    assert!(status.has_valid_token);
    assert!(status.expires_in > Duration::from_secs(590));
    assert!(status.expires_in <= Duration::from_secs(600));
}

#[tokio::test]
async fn logout_forgets_session() {
    let server = MockServer::start().await;
    let remote = remote(&config(&server));
    seed(&remote, "access-1", Duration::from_secs(600));

    remote.logout(SESSION).unwrap();
    assert!(!remote.is_authenticated(SESSION).await);
}

#[tokio::test]
async fn file_store_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("access-1", Some("refresh-1"))),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");
    let config = config(&server);

    let first = Remote::new(&config, FileStore::new(&path)).unwrap();
    first.exchange_code_for_token(SESSION, "the-code").await.unwrap();
    drop(first);

    let second = Remote::new(&config, FileStore::new(&path)).unwrap();
    let record = second.tokens().get(SESSION).unwrap().unwrap();
    assert_eq!(record.access_token, "access-1");
    assert!(second.is_authenticated(SESSION).await);
}
