//! Revocation lookups.
//!
//! The issuer writes `valid:{user_id}:{nonce}` when it hands out a credential
//! and deletes it to revoke. A credential is live exactly while that key exists.

use tracing::debug;

use crate::error::StoreError;
use crate::store::KeyValueStore;

/// Store key marking a credential as live.
pub fn revocation_key(user_id: i64, nonce: &str) -> String {
    format!("valid:{}:{}", user_id, nonce)
}

/// Read-only view of the revocation entries.
pub struct RevocationStore<S> {
    store: S,
}

impl<S: KeyValueStore> RevocationStore<S> {
    /// Create a revocation view over the shared store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Whether the credential `(user_id, nonce)` is still live.
    pub async fn is_live(&self, user_id: i64, nonce: &str) -> Result<bool, StoreError> {
        let live = self
            .store
            .get(&revocation_key(user_id, nonce))
            .await?
            .is_some();

        debug!(user_id, live, "Revocation lookup");
        Ok(live)
    }
}
