//! Single-flight refresh behavior

mod common;

use common::*;
use futures::future::join_all;
use sessiongate_client::{
    AccessCredential, Method, RefreshFailure, RefreshOutcome, StatusCode,
};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;

    protected("/microservices", "stale", 401)
        .expect(10)
        .mount(&server)
        .await;
    protected("/microservices", "fresh", 200)
        .expect(10)
        .mount(&server)
        .await;
    refresh_succeeds("fresh", Duration::from_millis(300))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_token(&server, "stale");
    let requests = (0..10).map(|_| {
        let client = client.clone();
        async move {
            client
                .fetch_authenticated(client.request(Method::GET, "/microservices"))
                .await
        }
    });

    let responses = join_all(requests).await;
    for response in responses {
        assert_eq!(response.unwrap().status(), StatusCode::OK);
    }
    assert_eq!(client.refresher().exchanges(), 1);
    assert!(!client.refresher().in_flight());
    assert_eq!(client.token_store().get(), Some(AccessCredential::new("fresh")));
}

#[tokio::test]
async fn test_concurrent_waiters_observe_same_failure() {
    let server = MockServer::start().await;

    refresh_rejected(401, Duration::from_millis(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_token(&server, "stale");
    let outcomes = join_all((0..5).map(|_| client.refresher().refresh())).await;

    for outcome in outcomes {
        assert_eq!(
            outcome,
            RefreshOutcome::Failure(RefreshFailure::ExpiredOrRevoked { status: 401 })
        );
    }
    assert_eq!(client.refresher().exchanges(), 1);
    assert!(client.token_store().get().is_none());
}

#[tokio::test]
async fn test_settled_refresh_allows_a_new_one() {
    let server = MockServer::start().await;

    refresh_succeeds("fresh", Duration::ZERO)
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.refresher().refresh().await.is_success());
    assert!(client.refresher().refresh().await.is_success());
    assert_eq!(client.refresher().exchanges(), 2);
}

#[tokio::test]
async fn test_abandoned_waiter_does_not_cancel_refresh() {
    let server = MockServer::start().await;

    refresh_succeeds("fresh", Duration::from_millis(300))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), client.refresher().refresh()).await;
    assert!(abandoned.is_err());
    assert!(client.refresher().in_flight());

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(!client.refresher().in_flight());
    assert_eq!(client.token_store().get(), Some(AccessCredential::new("fresh")));
}

#[tokio::test]
async fn test_logout_during_refresh_is_not_overwritten() {
    let server = MockServer::start().await;

    refresh_succeeds("fresh", Duration::from_millis(300))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_with_token(&server, "stale");
    let refreshing = {
        let client = client.clone();
        tokio::spawn(async move { client.refresher().refresh().await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    client.logout().await;

    let outcome = refreshing.await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Failure(RefreshFailure::Superseded));
    assert!(client.token_store().get().is_none());
}

#[tokio::test]
async fn test_server_error_keeps_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/refresh-token"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_with_token(&server, "maybe-valid");
    let outcome = client.refresher().refresh().await;

    assert_eq!(
        outcome,
        RefreshOutcome::Failure(RefreshFailure::Server { status: 503 })
    );
    assert_eq!(
        client.token_store().get(),
        Some(AccessCredential::new("maybe-valid"))
    );
}

#[tokio::test]
async fn test_success_without_token_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let client = client_with_token(&server, "maybe-valid");
    let outcome = client.refresher().refresh().await;

    assert!(matches!(
        outcome,
        RefreshOutcome::Failure(RefreshFailure::InvalidResponse(_))
    ));
    assert_eq!(
        client.token_store().get(),
        Some(AccessCredential::new("maybe-valid"))
    );
}

#[tokio::test]
async fn test_login_during_refresh_is_used_for_retry() {
    let server = MockServer::start().await;

    protected("/microservices", "stale", 401)
        .expect(1)
        .mount(&server)
        .await;
    protected("/microservices", "tok-2", 200)
        .expect(1)
        .mount(&server)
        .await;
    refresh_succeeds("fresh", Duration::from_millis(300))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "accessToken": "tok-2" })))
        .mount(&server)
        .await;

    let client = client_with_token(&server, "stale");
    let fetching = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .fetch_authenticated(client.request(Method::GET, "/microservices"))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    client
        .login(&sessiongate_client::Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();

    let response = fetching.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(client.token_store().get(), Some(AccessCredential::new("tok-2")));
}
