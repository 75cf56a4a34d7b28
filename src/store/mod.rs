//! Shared key/value store layer.
//!
//! Revocation entries and rate-limit counters live in an external store that
//! is shared by every gateway process. This module defines the minimal command
//! set the gateway needs and two implementations:
//!
//! - [`RedisStore`] - production store, connects lazily on first use
//! - [`MemoryStore`] - in-process store for tests and local development
//!
//! # Key Patterns
//!
//! - `valid:{user_id}:{nonce}` - revocation entry, present while the credential is live
//! - `rl:{user_id}:{nonce}:{minute}` - request counter for one wall-clock minute

mod memory;
mod redis_store;

use async_trait::async_trait;

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// The commands the gateway issues against the shared store.
///
/// Implementations must be safe to share between concurrent request tasks and
/// must apply `incr` atomically.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Atomically add one to the integer at `key` (missing keys start at 0)
    /// and return the new value.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Set the key's time-to-live in seconds.
    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        (**self).incr(key).await
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        (**self).expire(key, seconds).await
    }
}
