//! API key authentication for operation routes.
//!
//! Every operation request must carry a signed credential in the `x-api-key`
//! header. The middleware hands it to the [`AuthGate`], which verifies the
//! signature, checks revocation and counts the request against the
//! credential's per-minute budget:
//!
//! ```text
//! GET /v1/image/gradient?texts=red&texts=blue
//! x-api-key: eyJhbGciOiJIUzI1NiJ9...
//! ```
//!
//! Admitted requests continue with an [`Identity`] in their extensions.
//! Rejections map to `401` (missing, invalid, revoked), `429` (budget spent)
//! or `503` (rate store down).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, warn};

use crate::auth::{AuthGate, Identity, API_KEY_HEADER};
use crate::error::AuthError;
use crate::store::KeyValueStore;

use super::handlers::ErrorResponse;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AuthError::MissingCredential => (StatusCode::UNAUTHORIZED, "missing_api_key"),
            AuthError::InvalidCredential => (StatusCode::UNAUTHORIZED, "invalid_api_key"),
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AuthError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            AuthError::StoreUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
        };
        let message = self.to_string();

        // Invalid keys can indicate probing; the rest are routine.
        match &self {
            AuthError::InvalidCredential | AuthError::StoreUnavailable => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
            _ => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

/// Axum middleware admitting requests through the [`AuthGate`].
///
/// # Example
///
/// ```ignore
/// use axum::{Router, middleware};
/// use imggen_gateway::server::auth::auth_middleware;
///
/// let gate = Arc::new(AuthGate::new(verifier, store));
/// let app = Router::new()
///     .route("/gradient", get(handler))
///     .route_layer(middleware::from_fn_with_state(gate, auth_middleware::<RedisStore>));
/// ```
pub async fn auth_middleware<S>(
    State(gate): State<Arc<AuthGate<S>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    S: KeyValueStore + 'static,
{
    // A header that is present but not visible ASCII is a bad key, not a missing one.
    let credential = match request.headers().get(API_KEY_HEADER) {
        Some(value) => Some(value.to_str().map_err(|_| AuthError::InvalidCredential)?),
        None => None,
    };

    let identity: Identity = gate.admit(credential).await?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
