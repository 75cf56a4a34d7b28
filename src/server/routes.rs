//! Router configuration for the image gateway.
//!
//! This module defines the HTTP routes and applies middleware for authentication
//! and CORS.
//!
//! # Route Structure
//!
//! ```text
//! /health                    - Health check (public)
//! /v1/operations             - Operation listing (public)
//! /v1/image/{name}           - One route per registered operation (protected)
//! ```
//!
//! Operation routes are registered individually from the dispatcher's
//! registry, so unknown names fall through to a `404` without touching the
//! auth gate or the rate-limit counters.
//!
//! # Example
//!
//! ```ignore
//! use imggen_gateway::server::routes::{create_router, RouterConfig};
//!
//! let dispatcher = Dispatcher::new(BasicEngine::new(), HttpImageFetcher::new()?)?;
//! let gate = AuthGate::new(CredentialVerifier::new(secret), Arc::new(store));
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(dispatcher, gate, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{RawQuery, State},
    middleware,
    routing::get,
    Extension, Router,
};
use http::header::{HeaderName, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::auth_middleware;
use super::handlers::{
    health_handler, operation_handler, operations_handler, unknown_operation_handler, AppState,
    OPERATION_PREFIX,
};
use crate::auth::{AuthGate, Identity, API_KEY_HEADER};
use crate::dispatch::{Dispatcher, ImageFetcher};
use crate::engine::ImageEngine;
use crate::store::KeyValueStore;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// Builds:
/// - Public routes (health check, operation listing)
/// - One protected route per registered operation
/// - CORS configuration
/// - Request tracing (optional)
pub fn create_router<E, F, S>(
    dispatcher: Dispatcher<E, F>,
    gate: AuthGate<S>,
    config: RouterConfig,
) -> Router
where
    E: ImageEngine,
    F: ImageFetcher,
    S: KeyValueStore + 'static,
{
    let app_state = AppState::new(dispatcher);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .nest(
            OPERATION_PREFIX,
            build_operation_router(app_state.clone(), Arc::new(gate)),
        )
        .merge(build_public_router(app_state))
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// One `GET` route per operation, guarded by the auth gate.
///
/// The gate runs as a route layer, so it only sees requests that matched a
/// registered operation; the fallback answers unknown names directly.
fn build_operation_router<E, F, S>(app_state: AppState<E, F>, gate: Arc<AuthGate<S>>) -> Router
where
    E: ImageEngine,
    F: ImageFetcher,
    S: KeyValueStore + 'static,
{
    let mut router: Router<AppState<E, F>> = Router::new();

    let names: Vec<Arc<str>> = app_state
        .dispatcher
        .registry()
        .operations()
        .map(|descriptor| Arc::from(descriptor.name()))
        .collect();

    let has_operations = !names.is_empty();
    for name in names {
        let path = format!("/{}", name);
        router = router.route(
            &path,
            get(
                move |state: State<AppState<E, F>>,
                      identity: Extension<Identity>,
                      query: RawQuery| {
                    operation_handler(state, Arc::clone(&name), identity, query)
                },
            ),
        );
    }

    // route_layer panics on a router without routes.
    if !has_operations {
        return router
            .fallback(unknown_operation_handler)
            .with_state(app_state);
    }

    router
        .route_layer(middleware::from_fn_with_state(gate, auth_middleware::<S>))
        .fallback(unknown_operation_handler)
        .with_state(app_state)
}

fn build_public_router<E, F>(app_state: AppState<E, F>) -> Router
where
    E: ImageEngine,
    F: ImageFetcher,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/operations", get(operations_handler::<E, F>))
        .with_state(app_state)
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([HeaderName::from_static(API_KEY_HEADER), CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}
