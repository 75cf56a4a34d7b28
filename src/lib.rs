//! # imggen-gateway
//!
//! An authenticated HTTP gateway in front of an image-generation engine.
//!
//! Each request carries a signed API key. The gateway verifies it, checks that
//! it has not been revoked, counts the request against the key's per-minute
//! budget and only then dispatches to one of the engine's operations, streaming
//! the resulting JPEG back to the client.
//!
//! ## Features
//!
//! - **Signed API keys**: HS256 tokens carrying user id, rate budget and nonce
//! - **Revocation**: keys are live only while their entry exists in Redis
//! - **Fixed-window rate limiting**: per key, reset at each wall-clock minute
//! - **Operation table**: routes derived from the engine's declared operations
//! - **Remote inputs**: size-limited fetch of input images for paste operations
//! - **Streaming output**: images are sent while they are being encoded
//!
//! ## Architecture
//!
//! - [`store`] - Key/value store seam with Redis and in-memory implementations
//! - [`auth`] - Credential verification, revocation, rate limiting and the gate
//! - [`engine`] - Engine trait and the built-in `image`-based engine
//! - [`dispatch`] - Operation registry, dispatcher and remote image fetcher
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use imggen_gateway::{
//!     create_router, AuthGate, BasicEngine, CredentialVerifier, Dispatcher, HttpImageFetcher,
//!     RedisStore, RouterConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(RedisStore::open("redis://127.0.0.1:6379")?);
//!     let gate = AuthGate::new(CredentialVerifier::new("secret"), store);
//!     let dispatcher = Dispatcher::new(BasicEngine::new(), HttpImageFetcher::new()?)?;
//!
//!     let router = create_router(dispatcher, gate, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use auth::{
    AuthGate, Claims, Clock, CredentialVerifier, FixedClock, Identity, RateLimiter,
    RevocationStore, SystemClock, API_KEY_HEADER,
};
pub use config::{CheckConfig, Cli, Command, ServeConfig, TokenConfig};
pub use dispatch::{
    DispatchRequest, Dispatcher, HttpImageFetcher, ImageFetcher, OperationDescriptor,
    OperationRegistry, Shape, MAX_FETCH_SIZE,
};
pub use engine::{
    BasicEngine, GenerateArgs, ImageEngine, ImageStream, OperationDecl, ParamKind,
    DEFAULT_JPEG_QUALITY,
};
pub use error::{AuthError, DispatchError, EngineError, FetchError, RegistryError, StoreError};
pub use server::{create_router, AppState, ErrorResponse, RouterConfig};
pub use store::{KeyValueStore, MemoryStore, RedisStore};
