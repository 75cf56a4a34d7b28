//! Fixed-window rate limiting.
//!
//! Each credential gets a counter per wall-clock minute:
//!
//! ```text
//! key   = rl:{user_id}:{nonce}:{minute_of_hour}
//! count = INCR key
//! if count == 1: EXPIRE key (60 - second)
//! admit iff count <= limit
//! ```
//!
//! Windows align to minute boundaries rather than rolling from the first
//! request, so a client can spend a full budget at second 59 and another at
//! second 0 of the next minute. Requests over budget still increment the
//! counter; nothing is rolled back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::StoreError;
use crate::store::KeyValueStore;

/// Length of a rate-limit window in seconds.
pub const WINDOW_SECONDS: u64 = 60;

/// Source of wall-clock time for window computation.
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds (UTC).
    fn unix_now(&self) -> u64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A manually driven clock.
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicU64,
}

impl FixedClock {
    /// Create a clock frozen at `unix_secs`.
    pub fn new(unix_secs: u64) -> Self {
        Self {
            now: AtomicU64::new(unix_secs),
        }
    }

    /// Move the clock to `unix_secs`.
    pub fn set(&self, unix_secs: u64) {
        self.now.store(unix_secs, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn unix_now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Split a Unix timestamp into (minute of hour, second of minute).
pub fn window_position(unix_secs: u64) -> (u64, u64) {
    let minute = (unix_secs / WINDOW_SECONDS) % 60;
    let second = unix_secs % WINDOW_SECONDS;
    (minute, second)
}

/// Store key for a credential's counter in the given minute.
pub fn rate_limit_key(user_id: i64, nonce: &str, minute: u64) -> String {
    format!("rl:{}:{}:{}", user_id, nonce, minute)
}

/// Per-credential fixed-window limiter over the shared store.
pub struct RateLimiter<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> RateLimiter<S> {
    /// Create a limiter using the system clock.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Create a limiter with a custom clock.
    pub fn with_clock(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Count one request against the current window.
    ///
    /// Returns `Ok(true)` if the request is within `limit`. The counter is
    /// incremented either way.
    pub async fn try_acquire(
        &self,
        user_id: i64,
        nonce: &str,
        limit: u32,
    ) -> Result<bool, StoreError> {
        let (minute, second) = window_position(self.clock.unix_now());
        let key = rate_limit_key(user_id, nonce, minute);

        let count = self.store.incr(&key).await?;
        if count == 1 {
            // First hit of the window: expire at the next minute boundary.
            self.store.expire(&key, WINDOW_SECONDS - second).await?;
        }

        let admitted = count <= i64::from(limit);
        debug!(user_id, minute, count, limit, admitted, "Rate window counted");
        Ok(admitted)
    }
}
