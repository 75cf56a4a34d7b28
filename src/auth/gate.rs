//! Request admission.
//!
//! The gate runs the credential through a fixed sequence of checks. Each check
//! either advances the request to the next stage or rejects it:
//!
//! ```text
//! Unauthenticated ──header──▶ (token) ──verify──▶ SignatureChecked
//!       │                                               │
//!       ▼                                            is_live
//! MissingCredential / InvalidCredential                  ▼
//!                                               RevocationChecked ──try_acquire──▶ RateChecked ──▶ Admitted
//!                                                       │                              │
//!                                                  Unauthorized              RateLimited / StoreUnavailable
//! ```
//!
//! The order matters: only requests that pass the revocation check touch the
//! rate counter, and the counter is the only state the gate ever writes.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::AuthError;
use crate::store::KeyValueStore;

use super::credential::CredentialVerifier;
use super::rate_limit::{Clock, RateLimiter, SystemClock};
use super::revocation::RevocationStore;

/// Header carrying the credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The identity of an admitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub rate_limit: u32,
    pub nonce: String,
}

/// Stages of the admission state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    Unauthenticated,
    SignatureChecked,
    RevocationChecked,
    RateChecked,
    Admitted,
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GateStage::Unauthenticated => "unauthenticated",
            GateStage::SignatureChecked => "signature_checked",
            GateStage::RevocationChecked => "revocation_checked",
            GateStage::RateChecked => "rate_checked",
            GateStage::Admitted => "admitted",
        };
        f.write_str(name)
    }
}

/// Combines credential verification, revocation and rate limiting.
pub struct AuthGate<S> {
    verifier: CredentialVerifier,
    revocation: RevocationStore<S>,
    limiter: RateLimiter<S>,
}

impl<S: KeyValueStore + Clone> AuthGate<S> {
    /// Create a gate over the shared store using the system clock.
    pub fn new(verifier: CredentialVerifier, store: S) -> Self {
        Self::with_clock(verifier, store, Arc::new(SystemClock))
    }

    /// Create a gate with a custom clock for the rate limiter.
    pub fn with_clock(verifier: CredentialVerifier, store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            verifier,
            revocation: RevocationStore::new(store.clone()),
            limiter: RateLimiter::with_clock(store, clock),
        }
    }
}

impl<S: KeyValueStore> AuthGate<S> {
    /// Decide whether a request carrying `credential` is admitted.
    pub async fn admit(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        let mut stage = GateStage::Unauthenticated;

        let token = credential.ok_or_else(|| reject(stage, AuthError::MissingCredential))?;

        let claims = self
            .verifier
            .verify(token)
            .map_err(|e| reject(stage, e))?;
        stage = GateStage::SignatureChecked;

        match self.revocation.is_live(claims.user_id, &claims.nonce).await {
            Ok(true) => {}
            Ok(false) => return Err(reject(stage, AuthError::Unauthorized)),
            Err(e) => {
                // Fail closed: an unreachable store never admits.
                warn!(stage = %stage, error = %e, "Revocation lookup failed");
                return Err(reject(stage, AuthError::Unauthorized));
            }
        }
        stage = GateStage::RevocationChecked;

        match self
            .limiter
            .try_acquire(claims.user_id, &claims.nonce, claims.rate_limit)
            .await
        {
            Ok(true) => {}
            Ok(false) => return Err(reject(stage, AuthError::RateLimited)),
            Err(e) => {
                warn!(stage = %stage, error = %e, "Rate limit update failed");
                return Err(reject(stage, AuthError::StoreUnavailable));
            }
        }
        stage = GateStage::RateChecked;
        debug!(stage = %stage, user_id = claims.user_id, "Rate budget available");
        stage = GateStage::Admitted;

        debug!(stage = %stage, user_id = claims.user_id, "Request admitted");
        Ok(Identity {
            user_id: claims.user_id,
            rate_limit: claims.rate_limit,
            nonce: claims.nonce,
        })
    }
}

fn reject(stage: GateStage, reason: AuthError) -> AuthError {
    debug!(stage = %stage, reason = %reason, "Request rejected");
    reason
}
