//! HTTP request handlers for the image gateway.
//!
//! # Endpoints
//!
//! - `GET /v1/image/{name}` - Run an operation (protected)
//! - `GET /v1/operations` - List registered operations
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::auth::Identity;
use crate::dispatch::{DispatchRequest, Dispatcher, ImageFetcher, OperationDescriptor, Shape};
use crate::engine::ImageEngine;
use crate::error::{DispatchError, EngineError, FetchError};

/// Content type of every generated image.
pub const IMAGE_CONTENT_TYPE: &str = "image/jpg";

/// Path prefix of the operation routes.
pub const OPERATION_PREFIX: &str = "/v1/image";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the dispatcher.
pub struct AppState<E, F> {
    pub dispatcher: Arc<Dispatcher<E, F>>,
}

impl<E, F> AppState<E, F> {
    pub fn new(dispatcher: Dispatcher<E, F>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

impl<E, F> Clone for AppState<E, F> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "rate_limited", "arity_mismatch")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// One entry of the operations listing.
#[derive(Debug, Serialize)]
pub struct OperationInfo {
    pub name: String,

    /// "text" or "paste"
    pub shape: &'static str,

    /// Number of arguments (always 1 for paste operations)
    pub arity: usize,

    pub summary: String,
    pub tag: &'static str,
    pub operation_id: String,

    /// Route serving this operation
    pub path: String,
}

impl From<&OperationDescriptor> for OperationInfo {
    fn from(descriptor: &OperationDescriptor) -> Self {
        let (shape, arity) = match descriptor.shape() {
            Shape::Paste => ("paste", 1),
            Shape::Text { arity } => ("text", arity),
        };

        Self {
            name: descriptor.name().to_string(),
            shape,
            arity,
            summary: descriptor.summary().to_string(),
            tag: descriptor.tag(),
            operation_id: descriptor.operation_id(),
            path: format!("{}/{}", OPERATION_PREFIX, descriptor.name()),
        }
    }
}

/// Response from the operations endpoint.
#[derive(Debug, Serialize)]
pub struct OperationsResponse {
    pub operations: Vec<OperationInfo>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert DispatchError to HTTP response.
///
/// - 4xx errors are logged at WARN level, except 404 at DEBUG
/// - 5xx errors are logged at ERROR level
impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            DispatchError::UnknownOperation(_) => (StatusCode::NOT_FOUND, "not_found"),
            DispatchError::ArityMismatch { .. } => (StatusCode::BAD_REQUEST, "arity_mismatch"),
            DispatchError::MissingUrl => (StatusCode::BAD_REQUEST, "missing_url"),
            DispatchError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "invalid_url"),

            DispatchError::Fetch(FetchError::Transport { .. }) => {
                (StatusCode::BAD_GATEWAY, "upstream_unavailable")
            }
            DispatchError::Fetch(_) => (StatusCode::BAD_REQUEST, "fetch_rejected"),

            DispatchError::Engine(EngineError::InvalidArgument(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_argument")
            }
            DispatchError::Engine(_) => (StatusCode::INTERNAL_SERVER_ERROR, "engine_error"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle an operation request.
///
/// # Endpoint
///
/// `GET /v1/image/{name}`
///
/// # Query Parameters
///
/// - `texts`: repeated, one per argument of a text operation (order matters)
/// - `url`: absolute http(s) URL of the input image of a paste operation
///
/// # Response
///
/// - `200 OK`: streamed JPEG body with `Content-Type: image/jpg`
/// - `400 Bad Request`: wrong argument count, bad url, rejected fetch
/// - `401`/`429`/`503`: rejected by the auth middleware
/// - `502 Bad Gateway`: the input image host could not be reached
pub async fn operation_handler<E, F>(
    State(state): State<AppState<E, F>>,
    name: Arc<str>,
    Extension(identity): Extension<Identity>,
    RawQuery(query): RawQuery,
) -> Result<Response, DispatchError>
where
    E: ImageEngine,
    F: ImageFetcher,
{
    let request = DispatchRequest::from_query(query.as_deref().unwrap_or(""));
    debug!(
        user_id = identity.user_id,
        operation = %name,
        texts = request.texts.len(),
        "Dispatching operation"
    );

    let stream = state.dispatcher.dispatch(&name, request).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, IMAGE_CONTENT_TYPE)],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Fallback for names under the operation prefix that are not registered.
pub async fn unknown_operation_handler(uri: Uri) -> DispatchError {
    let name = uri.path().trim_start_matches('/');
    DispatchError::UnknownOperation(name.to_string())
}

/// List registered operations.
///
/// # Endpoint
///
/// `GET /v1/operations`
pub async fn operations_handler<E, F>(State(state): State<AppState<E, F>>) -> Json<OperationsResponse>
where
    E: ImageEngine,
    F: ImageFetcher,
{
    let operations = state
        .dispatcher
        .registry()
        .operations()
        .map(OperationInfo::from)
        .collect();

    Json(OperationsResponse { operations })
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
