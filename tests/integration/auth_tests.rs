//! Authentication integration tests.
//!
//! Tests verify:
//! - Requests without a valid, live API key never reach the engine
//! - Per-minute budgets are enforced and reset at the minute boundary
//! - Store failures fail closed
//! - Public endpoints and unknown operations bypass the gate

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use tower::ServiceExt;

use imggen_gateway::auth::revocation_key;
use imggen_gateway::{
    create_router, AuthGate, Claims, CredentialVerifier, Dispatcher, FixedClock, RouterConfig,
    API_KEY_HEADER,
};

use super::test_utils::{
    issue_token, send, IncrFailingStore, MockFetcher, RecordingEngine, TestApp, TEST_NOW,
    TEST_SECRET,
};

const CAPTION: &str = "/v1/image/caption?texts=top&texts=bottom";

// =============================================================================
// Credential Checks
// =============================================================================

#[tokio::test]
async fn test_missing_api_key_rejected() {
    let app = TestApp::new();

    let response = app.get(CAPTION, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_type(), "missing_api_key");
    assert_eq!(response.json()["status"], 401);
    assert_eq!(app.engine.call_count(), 0);
}

#[tokio::test]
async fn test_garbage_api_key_rejected() {
    let app = TestApp::new();

    let response = app.get(CAPTION, Some("not-a-token")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_type(), "invalid_api_key");
    assert_eq!(app.engine.call_count(), 0);
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let app = TestApp::new();
    app.store.set(revocation_key(1, "n1"), "1").await;

    let forged = CredentialVerifier::new("some-other-secret")
        .issue(&Claims::new(1, 10, "n1"))
        .unwrap();

    let response = app.get(CAPTION, Some(&forged)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_type(), "invalid_api_key");
    assert_eq!(app.counter(1, "n1").await, None);
}

#[tokio::test]
async fn test_non_ascii_header_rejected_as_invalid() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri(CAPTION)
        .header(API_KEY_HEADER, HeaderValue::from_bytes(b"tok\xFFen").unwrap())
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.engine.call_count(), 0);
}

// =============================================================================
// Revocation
// =============================================================================

#[tokio::test]
async fn test_unknown_credential_rejected_before_counting() {
    let app = TestApp::new();
    let token = issue_token(5, 10, "never-granted");

    let response = app.get(CAPTION, Some(&token)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_type(), "unauthorized");

    // Revocation is checked before the rate counter is touched.
    assert_eq!(app.counter(5, "never-granted").await, None);
    assert_eq!(app.engine.call_count(), 0);
}

#[tokio::test]
async fn test_revoked_credential_rejected() {
    let app = TestApp::new();
    let token = app.grant(5, 10, "n5").await;

    assert_eq!(app.get(CAPTION, Some(&token)).await.status, StatusCode::OK);

    assert!(app.store.remove(&revocation_key(5, "n5")).await);

    let response = app.get(CAPTION, Some(&token)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.engine.call_count(), 1);
}

#[tokio::test]
async fn test_valid_credential_admitted() {
    let app = TestApp::new();
    let token = app.grant(9, 10, "n9").await;

    let response = app.get(CAPTION, Some(&token)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(app.counter(9, "n9").await, Some(1));
}

// =============================================================================
// Rate Limiting
// =============================================================================

#[tokio::test]
async fn test_budget_exhausted_returns_429() {
    let app = TestApp::new();
    let token = app.grant(1, 2, "n1").await;

    assert_eq!(app.get(CAPTION, Some(&token)).await.status, StatusCode::OK);
    assert_eq!(app.get(CAPTION, Some(&token)).await.status, StatusCode::OK);

    let response = app.get(CAPTION, Some(&token)).await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.error_type(), "rate_limited");

    // Rejected requests still count.
    assert_eq!(app.counter(1, "n1").await, Some(3));
    assert_eq!(app.engine.call_count(), 2);
}

#[tokio::test]
async fn test_budget_resets_next_minute() {
    let app = TestApp::new();
    let token = app.grant(1, 1, "n1").await;

    assert_eq!(app.get(CAPTION, Some(&token)).await.status, StatusCode::OK);
    assert_eq!(
        app.get(CAPTION, Some(&token)).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    // TEST_NOW is 30 seconds into its minute.
    app.clock.advance(30);
    assert_eq!(app.get(CAPTION, Some(&token)).await.status, StatusCode::OK);
    assert_eq!(app.counter(1, "n1").await, Some(1));
}

#[tokio::test]
async fn test_zero_budget_always_limited() {
    let app = TestApp::new();
    let token = app.grant(1, 0, "n1").await;

    let response = app.get(CAPTION, Some(&token)).await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.engine.call_count(), 0);
}

#[tokio::test]
async fn test_budgets_are_per_credential() {
    let app = TestApp::new();
    let first = app.grant(1, 1, "first").await;
    let second = app.grant(1, 1, "second").await;

    assert_eq!(app.get(CAPTION, Some(&first)).await.status, StatusCode::OK);
    assert_eq!(
        app.get(CAPTION, Some(&first)).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(app.get(CAPTION, Some(&second)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_requests_respect_budget() {
    let app = TestApp::new();
    let token = app.grant(3, 5, "burst").await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let router = app.router.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            send(&router, CAPTION, Some(&token)).await.status
        }));
    }

    let mut ok = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::TOO_MANY_REQUESTS => limited += 1,
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(ok, 5);
    assert_eq!(limited, 7);
    assert_eq!(app.counter(3, "burst").await, Some(12));
}

// =============================================================================
// Store Failures
// =============================================================================

#[tokio::test]
async fn test_store_down_fails_closed() {
    let app = TestApp::new();
    let token = app.grant(1, 10, "n1").await;
    app.store.set_unavailable(true);

    let response = app.get(CAPTION, Some(&token)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.engine.call_count(), 0);

    // The store error itself is not echoed.
    assert!(!String::from_utf8_lossy(&response.body).contains("memory store"));
}

#[tokio::test]
async fn test_rate_store_failure_returns_503() {
    let store = IncrFailingStore::default();
    store.memory().set(revocation_key(1, "n1"), "1").await;

    let engine = RecordingEngine::new();
    let gate = AuthGate::with_clock(
        CredentialVerifier::new(TEST_SECRET),
        store,
        Arc::new(FixedClock::new(TEST_NOW)),
    );
    let dispatcher = Dispatcher::new(engine.clone(), MockFetcher::new()).unwrap();
    let router = create_router(dispatcher, gate, RouterConfig::new().with_tracing(false));

    let token = issue_token(1, 10, "n1");
    let response = send(&router, CAPTION, Some(&token)).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.error_type(), "store_unavailable");
    assert!(!String::from_utf8_lossy(&response.body).contains("INCR"));
    assert_eq!(engine.call_count(), 0);
}

// =============================================================================
// Unprotected Paths
// =============================================================================

#[tokio::test]
async fn test_public_endpoints_need_no_key() {
    let app = TestApp::new();

    assert_eq!(app.get("/health", None).await.status, StatusCode::OK);
    assert_eq!(app.get("/v1/operations", None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_operation_is_404_without_key() {
    let app = TestApp::new();

    let response = app.get("/v1/image/nonexistent?texts=a", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.error_type(), "not_found");
}

#[tokio::test]
async fn test_unknown_operation_does_not_count() {
    let app = TestApp::new();
    let token = app.grant(1, 1, "n1").await;

    let response = app.get("/v1/image/nonexistent", Some(&token)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(app.counter(1, "n1").await, None);

    assert_eq!(app.get(CAPTION, Some(&token)).await.status, StatusCode::OK);
}
