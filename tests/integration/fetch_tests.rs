//! Remote fetch integration tests.
//!
//! A local axum server stands in for the image host so the HTTP fetcher is
//! exercised against real responses: announced lengths, chunked bodies,
//! error statuses, timeouts and refused connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use url::Url;

use imggen_gateway::auth::revocation_key;
use imggen_gateway::{
    create_router, AuthGate, BasicEngine, CredentialVerifier, Dispatcher, FetchError,
    HttpImageFetcher, ImageFetcher, MemoryStore, RouterConfig, MAX_FETCH_SIZE,
};

use super::test_utils::{is_valid_jpeg, issue_token, png_bytes, send, TEST_SECRET};

// =============================================================================
// Image Host
// =============================================================================

async fn small() -> Vec<u8> {
    vec![7u8; 100]
}

async fn oversized() -> Vec<u8> {
    vec![0u8; 5 * 1024 * 1024]
}

async fn chunked() -> Body {
    let chunks = vec![
        Ok::<_, std::io::Error>(Bytes::from_static(b"no ")),
        Ok(Bytes::from_static(b"length")),
    ];
    Body::from_stream(futures_util::stream::iter(chunks))
}

async fn empty() -> Vec<u8> {
    Vec::new()
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "gone")
}

async fn accepted() -> impl IntoResponse {
    (StatusCode::ACCEPTED, vec![1u8; 10])
}

async fn moved() -> Redirect {
    Redirect::temporary("/small.bin")
}

async fn slow() -> Vec<u8> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    vec![1u8; 10]
}

async fn png() -> Vec<u8> {
    png_bytes(16, 8, [10, 120, 250])
}

/// Serve the test routes on an ephemeral port.
async fn spawn_image_host() -> SocketAddr {
    let app = Router::new()
        .route("/small.bin", get(small))
        .route("/big.bin", get(oversized))
        .route("/chunked.bin", get(chunked))
        .route("/empty.bin", get(empty))
        .route("/missing.png", get(not_found))
        .route("/accepted.bin", get(accepted))
        .route("/moved.bin", get(moved))
        .route("/slow.bin", get(slow))
        .route("/input.png", get(png));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{}{}", addr, path)).unwrap()
}

// =============================================================================
// Fetcher Contract
// =============================================================================

#[tokio::test]
async fn test_fetch_small_resource() {
    let addr = spawn_image_host().await;
    let fetcher = HttpImageFetcher::new().unwrap();

    let data = fetcher.fetch(&url(addr, "/small.bin")).await.unwrap();
    assert_eq!(data.len(), 100);
    assert!(data.iter().all(|b| *b == 7));
}

#[tokio::test]
async fn test_fetch_rejects_oversized() {
    let addr = spawn_image_host().await;
    let fetcher = HttpImageFetcher::new().unwrap();

    let err = fetcher.fetch(&url(addr, "/big.bin")).await.unwrap_err();
    match err {
        FetchError::TooLarge { size, limit, .. } => {
            assert_eq!(size, 5 * 1024 * 1024);
            assert_eq!(limit, MAX_FETCH_SIZE);
        }
        other => panic!("expected TooLarge, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_rejects_missing_content_length() {
    let addr = spawn_image_host().await;
    let fetcher = HttpImageFetcher::new().unwrap();

    let err = fetcher.fetch(&url(addr, "/chunked.bin")).await.unwrap_err();
    assert!(matches!(err, FetchError::MissingContentLength { .. }), "{err:?}");
    assert!(err.to_string().starts_with("Unable to fetch resource at"));
}

#[tokio::test]
async fn test_fetch_rejects_empty_body() {
    let addr = spawn_image_host().await;
    let fetcher = HttpImageFetcher::new().unwrap();

    let err = fetcher.fetch(&url(addr, "/empty.bin")).await.unwrap_err();
    assert!(matches!(err, FetchError::MissingContentLength { .. }), "{err:?}");
}

#[tokio::test]
async fn test_fetch_rejects_non_200() {
    let addr = spawn_image_host().await;
    let fetcher = HttpImageFetcher::new().unwrap();

    let target = url(addr, "/missing.png");
    let err = fetcher.fetch(&target).await.unwrap_err();
    assert!(matches!(err, FetchError::UpstreamStatus { status: 404, .. }));
    assert_eq!(
        err.to_string(),
        format!("Resource at {} returned status code 404", target)
    );

    let err = fetcher.fetch(&url(addr, "/accepted.bin")).await.unwrap_err();
    assert!(matches!(err, FetchError::UpstreamStatus { status: 202, .. }));
}

#[tokio::test]
async fn test_fetch_does_not_follow_redirects() {
    let addr = spawn_image_host().await;
    let fetcher = HttpImageFetcher::new().unwrap();

    let err = fetcher.fetch(&url(addr, "/moved.bin")).await.unwrap_err();
    assert!(
        matches!(err, FetchError::UpstreamStatus { status: 307, .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_fetch_respects_custom_limit() {
    let addr = spawn_image_host().await;
    let fetcher = HttpImageFetcher::with_options(Duration::from_secs(5), 50).unwrap();

    let err = fetcher.fetch(&url(addr, "/small.bin")).await.unwrap_err();
    assert!(matches!(err, FetchError::TooLarge { size: 100, limit: 50, .. }));
}

#[tokio::test]
async fn test_fetch_timeout_is_transport_error() {
    let addr = spawn_image_host().await;
    let fetcher = HttpImageFetcher::with_options(Duration::from_millis(200), MAX_FETCH_SIZE).unwrap();

    let err = fetcher.fetch(&url(addr, "/slow.bin")).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }), "{err:?}");
}

#[tokio::test]
async fn test_fetch_refused_connection_is_transport_error() {
    // Bind then drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = HttpImageFetcher::new().unwrap();
    let err = fetcher.fetch(&url(addr, "/small.bin")).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }), "{err:?}");
}

// =============================================================================
// End to End
// =============================================================================

#[tokio::test]
async fn test_paste_through_http_fetcher() {
    let addr = spawn_image_host().await;

    let store = Arc::new(MemoryStore::new());
    store.set(revocation_key(2, "e2e"), "1").await;

    let dispatcher = Dispatcher::new(BasicEngine::new(), HttpImageFetcher::new().unwrap()).unwrap();
    let gate = AuthGate::new(CredentialVerifier::new(TEST_SECRET), store);
    let router = create_router(dispatcher, gate, RouterConfig::new().with_tracing(false));
    let key = issue_token(2, 10, "e2e");

    let uri = format!("/v1/image/flip?url=http://{}/input.png", addr);
    let response = send(&router, &uri, Some(&key)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(is_valid_jpeg(&response.body));

    let uri = format!("/v1/image/flip?url=http://{}/big.bin", addr);
    let response = send(&router, &uri, Some(&key)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_type(), "fetch_rejected");
}
