//! Shared setup for tests against a mock Spotify.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};
use spotremote::{
    config::{Config, Credentials},
    remote::Remote,
    retry::Retries,
    store::MemoryStore,
    tokens::TokenRecord,
};
use url::Url;
use wiremock::MockServer;

pub const SESSION: &str = "session-1";

/// Every retry pause shortened to a few milliseconds.
pub const RETRIES: Retries = Retries::scaled(Duration::from_millis(5));

pub fn credentials() -> Credentials {
    Credentials {
        client_id: "client-id".to_owned(),
        client_secret: "client-secret".to_owned(),
        redirect_uri: Url::parse("http://127.0.0.1:8000/spotify/redirect").unwrap(),
    }
}

/// Configuration with both the accounts service and the Web API mocked by
/// `server`.
pub fn config(server: &MockServer) -> Config {
    config_with_accounts(server, Url::parse(&server.uri()).unwrap())
}

pub fn config_with_accounts(server: &MockServer, accounts_url: Url) -> Config {
    let api_url = Url::parse(&format!("{}/v1/me/", server.uri())).unwrap();
    Config::with_credentials(credentials())
        .with_endpoints(accounts_url, api_url)
        .with_retries(RETRIES)
}

/// Configuration with the Web API at `api_url` and the accounts service
/// mocked by `server`.
pub fn config_with_api(server: &MockServer, api_url: Url) -> Config {
    Config::with_credentials(credentials())
        .with_endpoints(Url::parse(&server.uri()).unwrap(), api_url)
        .with_retries(RETRIES)
}

/// URL of a local port nobody listens on.
pub fn closed_port_url() -> Url {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap()
}

pub fn remote(config: &Config) -> Remote {
    Remote::new(config, MemoryStore::default()).unwrap()
}

/// Stores tokens for [`SESSION`] that expire after `expires_in`.
pub fn seed(remote: &Remote, access_token: &str, expires_in: Duration) -> TokenRecord {
    remote
        .tokens()
        .upsert(SESSION, access_token, "Bearer", expires_in, "refresh-1")
        .unwrap()
}

pub fn token_body(access_token: &str, refresh_token: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "scope": "user-read-playback-state",
        "expires_in": 3600,
    });
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = json!(refresh_token);
    }
    body
}

pub fn device(id: &str, name: &str, is_active: bool) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": "Computer",
        "is_active": is_active,
        "is_restricted": false,
        "volume_percent": 50,
    })
}

pub fn devices(devices: &[Value]) -> Value {
    json!({ "devices": devices })
}

pub fn api_error(status: u16, message: &str) -> Value {
    json!({ "error": { "status": status, "message": message } })
}
