//! Test utilities for integration tests.
//!
//! This module provides mock collaborators (engine, fetcher, store) and
//! helpers for building a router wired to them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tower::ServiceExt;
use url::Url;

use imggen_gateway::auth::{rate_limit_key, revocation_key, window_position};
use imggen_gateway::{
    create_router, AuthGate, Claims, Clock, CredentialVerifier, Dispatcher, EngineError, FetchError,
    FixedClock, GenerateArgs, ImageEngine, ImageFetcher, ImageStream, KeyValueStore, MemoryStore,
    OperationDecl, RouterConfig, StoreError, API_KEY_HEADER,
};

pub const TEST_SECRET: &str = "integration-test-signing-secret";

/// 2024-01-01T00:00:30Z, mid-way through a minute window.
pub const TEST_NOW: u64 = 1_704_067_230;

// =============================================================================
// Recording Engine
// =============================================================================

/// Bytes streamed back by [`RecordingEngine`] (split across two chunks).
pub const ENGINE_OUTPUT: &[u8] = b"\xFF\xD8recorded-image-bytes\xFF\xD9";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCall {
    pub operation: String,
    pub args: GenerateArgs,
}

/// An engine that records every call and returns fixed bytes.
///
/// Operations: `caption` (2 texts), `shout` (1 text), `blank` (no texts),
/// `wanted` (paste).
#[derive(Clone, Default)]
pub struct RecordingEngine {
    calls: Arc<Mutex<Vec<EngineCall>>>,
    failure: Option<EngineError>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose every call fails with `error`.
    pub fn failing(error: EngineError) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            failure: Some(error),
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageEngine for RecordingEngine {
    fn operations(&self) -> Vec<OperationDecl> {
        vec![
            OperationDecl::text("caption", 2),
            OperationDecl::text("shout", 1),
            OperationDecl::text("blank", 0),
            OperationDecl::paste("wanted"),
        ]
    }

    async fn generate(
        &self,
        operation: &str,
        args: GenerateArgs,
    ) -> Result<ImageStream, EngineError> {
        self.calls.lock().unwrap().push(EngineCall {
            operation: operation.to_string(),
            args,
        });

        if let Some(ref error) = self.failure {
            return Err(error.clone());
        }

        let chunks = vec![
            Ok(Bytes::from_static(&ENGINE_OUTPUT[..6])),
            Ok(Bytes::from_static(&ENGINE_OUTPUT[6..])),
        ];
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }
}

// =============================================================================
// Mock Fetcher
// =============================================================================

/// A fetcher serving canned responses by URL and recording requests.
///
/// Unknown URLs answer as an upstream 404.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<HashMap<String, Result<Bytes, FetchError>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, response: Result<Bytes, FetchError>) -> Self {
        Arc::make_mut(&mut self.responses).insert(url.to_string(), response);
        self
    }

    pub fn with_image(self, url: &str, data: impl Into<Bytes>) -> Self {
        self.with_response(url, Ok(data.into()))
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> Result<Bytes, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());

        match self.responses.get(url.as_str()) {
            Some(response) => response.clone(),
            None => Err(FetchError::UpstreamStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

// =============================================================================
// Stores
// =============================================================================

/// A store whose reads work but whose counters always fail.
///
/// Lets tests reach the rate-limit step with a healthy revocation lookup.
#[derive(Clone, Default)]
pub struct IncrFailingStore {
    inner: Arc<MemoryStore>,
}

impl IncrFailingStore {
    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl KeyValueStore for IncrFailingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn incr(&self, _key: &str) -> Result<i64, StoreError> {
        Err(StoreError::Command("INCR refused".to_string()))
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        self.inner.expire(key, seconds).await
    }
}

// =============================================================================
// Application Harness
// =============================================================================

/// A router wired to a recording engine, a mock fetcher, an in-memory store
/// and a manually driven clock.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub engine: RecordingEngine,
    pub fetcher: MockFetcher,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_parts(RecordingEngine::new(), MockFetcher::new())
    }

    pub fn with_engine(engine: RecordingEngine) -> Self {
        Self::with_parts(engine, MockFetcher::new())
    }

    pub fn with_fetcher(fetcher: MockFetcher) -> Self {
        Self::with_parts(RecordingEngine::new(), fetcher)
    }

    pub fn with_parts(engine: RecordingEngine, fetcher: MockFetcher) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(TEST_NOW));

        let gate = AuthGate::with_clock(
            CredentialVerifier::new(TEST_SECRET),
            Arc::clone(&store),
            clock.clone(),
        );
        let dispatcher = Dispatcher::new(engine.clone(), fetcher.clone()).unwrap();
        let router = create_router(dispatcher, gate, RouterConfig::new().with_tracing(false));

        Self {
            router,
            store,
            clock,
            engine,
            fetcher,
        }
    }

    /// Issue a token and mark it live in the store.
    pub async fn grant(&self, user_id: i64, rate_limit: u32, nonce: &str) -> String {
        self.store.set(revocation_key(user_id, nonce), "1").await;
        issue_token(user_id, rate_limit, nonce)
    }

    /// Current request count for a credential in the clock's minute window.
    pub async fn counter(&self, user_id: i64, nonce: &str) -> Option<i64> {
        let (minute, _) = window_position(self.clock.unix_now());
        self.store
            .value(&rate_limit_key(user_id, nonce, minute))
            .await
            .map(|v| v.parse().unwrap())
    }

    pub async fn get(&self, uri: &str, api_key: Option<&str>) -> TestResponse {
        send(&self.router, uri, api_key).await
    }
}

/// Sign a token with [`TEST_SECRET`] without touching any store.
pub fn issue_token(user_id: i64, rate_limit: u32, nonce: &str) -> String {
    CredentialVerifier::new(TEST_SECRET)
        .issue(&Claims::new(user_id, rate_limit, nonce))
        .unwrap()
}

// =============================================================================
// Requests
// =============================================================================

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
    }

    /// The `error` field of a JSON error body.
    pub fn error_type(&self) -> String {
        self.json()["error"].as_str().unwrap_or_default().to_string()
    }
}

pub async fn send(router: &Router, uri: &str, api_key: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().uri(uri);
    if let Some(key) = api_key {
        builder = builder.header(API_KEY_HEADER, key);
    }
    let request = builder.body(Body::empty()).unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();

    TestResponse {
        status,
        headers,
        body,
    }
}

// =============================================================================
// Images
// =============================================================================

/// Encode a solid RGB PNG.
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let pixels: Vec<u8> = (0..width * height).flat_map(|_| rgb).collect();
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(&pixels, width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Check that data starts with SOI and ends with EOI.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data[..2] == [0xFF, 0xD8] && data[data.len() - 2..] == [0xFF, 0xD9]
}
