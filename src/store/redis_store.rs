//! Redis-backed store with a lazily established, process-wide connection.
//!
//! The connection is opened on the first command rather than at construction,
//! so the server can start before Redis is reachable. A `OnceCell` guards the
//! handshake: concurrent first callers wait on a single in-flight attempt
//! instead of each opening their own connection. A failed attempt leaves the
//! cell empty and the next command retries.
//!
//! The redis-rs `MultiplexedConnection` is cheap to clone and safe to use
//! concurrently, so each command clones it and no further locking is needed.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;

use super::KeyValueStore;

/// Redis implementation of [`KeyValueStore`].
pub struct RedisStore {
    client: Client,
    connection: OnceCell<MultiplexedConnection>,
    connect_attempts: AtomicUsize,
}

impl RedisStore {
    /// Create a store for the given connection URI.
    ///
    /// Only the URI is validated here; no network traffic happens until the
    /// first command.
    pub fn open(uri: &str) -> Result<Self, StoreError> {
        // Do not log the URI, it may carry a password.
        let client = Client::open(uri).map_err(|e| {
            error!(error = %e, "Invalid Redis connection URI");
            StoreError::Connection(format!("Invalid Redis URI: {e}"))
        })?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            connect_attempts: AtomicUsize::new(0),
        })
    }

    /// Whether the shared connection has been established.
    pub fn is_connected(&self) -> bool {
        self.connection.initialized()
    }

    /// Number of connection handshakes started so far.
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Get the shared connection, establishing it on first use.
    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(attempt, "Connecting to Redis");

                let connection = self
                    .client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| {
                        error!(error = %e, attempt, "Failed to connect to Redis");
                        StoreError::Connection(format!("Failed to connect to Redis: {e}"))
                    })?;

                info!(attempt, "Connected to Redis");
                Ok::<_, StoreError>(connection)
            })
            .await?;

        Ok(connection.clone())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        conn.get(key).await.map_err(|e| {
            warn!(error = %e, "Redis GET failed");
            StoreError::Command(format!("GET failed: {e}"))
        })
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection().await?;
        conn.incr(key, 1i64).await.map_err(|e| {
            warn!(error = %e, "Redis INCR failed");
            StoreError::Command(format!("INCR failed: {e}"))
        })
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        let _: bool = conn.expire(key, seconds).await.map_err(|e| {
            warn!(error = %e, "Redis EXPIRE failed");
            StoreError::Command(format!("EXPIRE failed: {e}"))
        })?;
        Ok(())
    }
}
