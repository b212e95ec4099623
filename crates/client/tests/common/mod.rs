//! Shared fixtures for the session client integration tests

#![allow(dead_code)]

use serde_json::json;
use sessiongate_client::{AccessCredential, SessionClient};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EMAIL: &str = "ana@example.com";
pub const PASSWORD: &str = "correct-horse";

/// Install a test subscriber once; output is captured per test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("sessiongate_client=debug")
        .try_init();
}

/// Client pointed at the mock server
pub fn client_for(server: &MockServer) -> SessionClient {
    init_tracing();
    SessionClient::new(server.uri()).unwrap()
}

/// Client whose store already holds `token`
pub fn client_with_token(server: &MockServer, token: &str) -> SessionClient {
    let client = client_for(server);
    client
        .token_store()
        .set(Some(AccessCredential::new(token)));
    client
}

/// Base URL of a port nothing listens on
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// `/refresh-token` answering with `token` after `delay`
pub fn refresh_succeeds(token: &str, delay: Duration) -> Mock {
    Mock::given(method("POST"))
        .and(path("/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": token }))
                .set_delay(delay),
        )
}

/// `/refresh-token` rejecting the cookie with `status` after `delay`
pub fn refresh_rejected(status: u16, delay: Duration) -> Mock {
    Mock::given(method("POST"))
        .and(path("/refresh-token"))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_json(json!({ "detail": "Missing refresh token cookie" }))
                .set_delay(delay),
        )
}

/// `GET {route}` answering `status` when called with `token`
pub fn protected(route: &str, token: &str, status: u16) -> Mock {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", bearer(token).as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "route": route })))
}
