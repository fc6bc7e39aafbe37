//! Integration tests for single-flight token refresh over real HTTP
//!
//! **Purpose**: Exercise the 401 → refresh → replay path end to end,
//! with the mock server answering by token value so the flow is driven
//! by what is actually on the wire.
//!
//! **Coverage:**
//! - Expired token: one refresh, stored tokens updated, request replayed
//! - Expired stamp: a successful refresh restores `is_authenticated`
//! - Concurrent expiry: many requests share a single refresh
//! - Refresh failure: every waiting request rejected, credentials untouched
//! - Hung refresh: treated as auth failure via the request timeout
//! - No refresher configured: the 401 surfaces directly
//!
//! **Infrastructure:**
//! - WireMock HTTP server matching on the `Authorization` header
//! - In-memory credential store seeded with a stale token

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use lumara_client::{
    ApiError, Client, ClientConfig, MemoryCredentialStore, RefreshError, TokenPair,
    TokenRefresher,
};
use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Scripted Refresher
// ============================================================================

struct ScriptedRefresher {
    calls: AtomicUsize,
    delay: Duration,
    result: Result<TokenPair, RefreshError>,
}

impl ScriptedRefresher {
    fn new(result: Result<TokenPair, RefreshError>) -> Self {
        Self { calls: AtomicUsize::new(0), delay: Duration::ZERO, result }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(&self) -> Result<TokenPair, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

/// The mock answers by token value: the stale token is rejected with a
/// 401 and the fresh one succeeds, exactly like an expiring session.
async fn mount_token_aware_feed(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/feed"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "token expired"})),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/feed"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1, 2, 3]})))
        .mount(server)
        .await;
}

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::builder(server.uri())
        .base_backoff_delay(Duration::from_millis(20))
        .request_timeout(Duration::from_secs(2))
        .build()
        .expect("config should build")
}

fn stale_store() -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with_tokens(TokenPair::new("stale-token")))
}

fn client_with_refresher(
    config: ClientConfig,
    store: Arc<MemoryCredentialStore>,
    refresher: Arc<ScriptedRefresher>,
) -> Client {
    Client::builder(config)
        .credential_store(store)
        .refresher(refresher)
        .build()
        .expect("client should build")
}

// ============================================================================
// Integration Tests
// ============================================================================

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_replayed() {
    let server = MockServer::start().await;
    mount_token_aware_feed(&server).await;

    let store = stale_store();
    let refresher = Arc::new(ScriptedRefresher::new(Ok(
        TokenPair::new("fresh-token").with_refresh_token("next-refresh")
    )));
    let client = client_with_refresher(config_for(&server), store.clone(), refresher.clone());

    let response = client.get("/v1/feed").await.expect("request should succeed after refresh");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(refresher.calls(), 1);

    // The stale attempt plus exactly one replay with the fresh token.
    let requests = server.received_requests().await.expect("requests should be recorded");
    assert_eq!(requests.len(), 2);

    let stored = store.current().await.expect("store should hold tokens");
    assert_eq!(stored.access_token, "fresh-token");
    assert_eq!(stored.refresh_token.as_deref(), Some("next-refresh"));
}

#[tokio::test]
async fn test_refresh_after_expiry_restores_authenticated_state() {
    let server = MockServer::start().await;
    mount_token_aware_feed(&server).await;

    // The stored pair carries an expiry that has already passed, exactly
    // the state a woken-up client finds itself in.
    let store = Arc::new(MemoryCredentialStore::with_tokens(
        TokenPair::new("stale-token").with_lifetime(-60),
    ));
    let refresher = Arc::new(ScriptedRefresher::new(Ok(TokenPair::new("fresh-token"))));
    let client = client_with_refresher(config_for(&server), store.clone(), refresher.clone());

    assert!(!client.is_authenticated().await);

    let response = client.get("/v1/feed").await.expect("request should succeed after refresh");
    assert_eq!(response.status(), StatusCode::OK);

    assert!(
        client.is_authenticated().await,
        "a successful refresh must leave the client authenticated"
    );
    let stored = store.current().await.expect("store should hold tokens");
    assert_eq!(stored.access_token, "fresh-token");
    assert!(stored.expires_at.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_expired_requests_share_one_refresh() {
    let server = MockServer::start().await;
    mount_token_aware_feed(&server).await;

    let refresher = Arc::new(
        ScriptedRefresher::new(Ok(TokenPair::new("fresh-token")))
            .with_delay(Duration::from_millis(300)),
    );
    let client = Arc::new(client_with_refresher(
        config_for(&server),
        stale_store(),
        refresher.clone(),
    ));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get("/v1/feed").await })
        })
        .collect();
    for outcome in join_all(handles).await {
        let response = outcome.expect("task should join").expect("request should succeed");
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(refresher.calls(), 1, "concurrent expiry must share a single refresh");

    // Every logical call ends with exactly one fresh-token request, and at
    // least one stale attempt must have triggered the refresh.
    let requests = server.received_requests().await.expect("requests should be recorded");
    let auth_values: Vec<&str> = requests
        .iter()
        .filter_map(|request| request.headers.get("authorization"))
        .filter_map(|value| value.to_str().ok())
        .collect();
    let fresh = auth_values.iter().filter(|value| **value == "Bearer fresh-token").count();
    let stale = auth_values.iter().filter(|value| **value == "Bearer stale-token").count();
    assert_eq!(fresh, 5);
    assert!(stale >= 1);
    assert_eq!(auth_values.len(), fresh + stale);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_refresh_rejects_all_waiting_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/feed"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "token expired"})),
        )
        .mount(&server)
        .await;

    let store = stale_store();
    let refresher = Arc::new(
        ScriptedRefresher::new(Err(RefreshError::Rejected("refresh token revoked".into())))
            .with_delay(Duration::from_millis(300)),
    );
    let client =
        Arc::new(client_with_refresher(config_for(&server), store.clone(), refresher.clone()));

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get("/v1/feed").await })
        })
        .collect();
    for outcome in join_all(handles).await {
        let err = outcome.expect("task should join").expect_err("request should fail");
        match err {
            ApiError::Unauthorized { message } => {
                assert!(message.contains("refresh token revoked"));
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    assert_eq!(refresher.calls(), 1);
    let stored = store.current().await.expect("store should hold tokens");
    assert_eq!(stored.access_token, "stale-token");
}

#[tokio::test]
async fn test_hung_refresh_is_treated_as_auth_failure() {
    let server = MockServer::start().await;
    mount_token_aware_feed(&server).await;

    let config = ClientConfig::builder(server.uri())
        .request_timeout(Duration::from_millis(200))
        .build()
        .expect("config should build");
    let refresher = Arc::new(
        ScriptedRefresher::new(Ok(TokenPair::new("fresh-token")))
            .with_delay(Duration::from_secs(10)),
    );
    let client = client_with_refresher(config, stale_store(), refresher.clone());

    let err = client.get("/v1/feed").await.expect_err("request should fail");

    match err {
        ApiError::Unauthorized { message } => assert!(message.contains("timed out")),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn test_unauthorized_without_refresher_surfaces_directly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/feed"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "token expired"})),
        )
        .mount(&server)
        .await;

    let client = Client::builder(config_for(&server))
        .credential_store(stale_store())
        .build()
        .expect("client should build");

    let err = client.get("/v1/feed").await.expect_err("request should fail");

    match err {
        ApiError::Unauthorized { message } => assert_eq!(message, "token expired"),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
    let requests = server.received_requests().await.expect("requests should be recorded");
    assert_eq!(requests.len(), 1, "a 401 without a refresher must not be retried");
}
