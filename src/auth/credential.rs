//! Signed credential (API key) verification.
//!
//! API keys are HS256 JWTs signed with a secret shared with whatever service
//! issues them. The payload carries three claims, kept short because the token
//! travels in a header on every request:
//!
//! ```text
//! { "id": <user id>, "rl": <requests per minute>, "r": "<random nonce>" }
//! ```
//!
//! An `exp` claim is honoured when present but not required.
//!
//! # Security
//!
//! - Tokens are size-checked before parsing
//! - Only HS256 is accepted; the header's `alg` cannot downgrade verification
//! - Every failure maps to the same `InvalidCredential` error

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;

/// Maximum accepted token size in bytes.
pub const MAX_TOKEN_SIZE: usize = 8192;

/// Claims decoded from a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User identity
    #[serde(rename = "id")]
    pub user_id: i64,

    /// Maximum requests per wall-clock minute
    #[serde(rename = "rl")]
    pub rate_limit: u32,

    /// Random per-issuance value, part of the revocation and rate-limit keys
    #[serde(rename = "r")]
    pub nonce: String,

    /// Optional expiry (Unix epoch seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl Claims {
    /// Create claims without an expiry.
    pub fn new(user_id: i64, rate_limit: u32, nonce: impl Into<String>) -> Self {
        Self {
            user_id,
            rate_limit,
            nonce: nonce.into(),
            exp: None,
        }
    }

    /// Set an absolute expiry timestamp.
    pub fn with_expiry(mut self, exp: u64) -> Self {
        self.exp = Some(exp);
        self
    }
}

/// Verifies and issues HS256 credentials with a shared secret.
#[derive(Clone)]
pub struct CredentialVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl CredentialVerifier {
    /// Create a verifier for the given signing secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    /// Check the token's signature and decode its claims.
    ///
    /// No store or network access; a pure function of secret and token.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if token.len() > MAX_TOKEN_SIZE {
            debug!(size = token.len(), "Credential rejected: oversized token");
            return Err(AuthError::InvalidCredential);
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!(error = %e, "Credential rejected");
            AuthError::InvalidCredential
        })?;

        Ok(data.claims)
    }

    /// Sign claims into a token.
    ///
    /// The gateway never issues credentials on its own; this backs the
    /// `token` subcommand and tests.
    pub fn issue(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
    }
}
