//! In-process store for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::StoreError;

use super::KeyValueStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Option<u64>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: String) -> Self {
        Self {
            value,
            ttl: None,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// A `HashMap`-backed [`KeyValueStore`].
///
/// Expiry follows Redis: a key whose TTL has elapsed reads as missing and a
/// following `incr` starts again from 1. This matters because rate counter
/// keys carry only the minute of the hour and repeat every hour.
/// `set_unavailable(true)` makes every command fail, which is how tests
/// exercise the fail-closed paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub async fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .lock()
            .await
            .insert(key.into(), Entry::new(value.into()));
    }

    /// Remove a key, returning whether it existed.
    pub async fn remove(&self, key: &str) -> bool {
        self.entries.lock().await.remove(key).is_some()
    }

    /// The TTL last set on a live key, in seconds.
    pub async fn ttl(&self, key: &str) -> Option<u64> {
        let mut entries = self.entries.lock().await;
        live_entry(&mut entries, key).and_then(|e| e.ttl)
    }

    /// Current value of a live key.
    pub async fn value(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        live_entry(&mut entries, key).map(|e| e.value.clone())
    }

    /// Make every subsequent command fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Connection("memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        Ok(self.value(key).await)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.check_available()?;
        let mut entries = self.entries.lock().await;
        if entries
            .get(key)
            .is_some_and(|e| e.is_expired(Instant::now()))
        {
            entries.remove(key);
        }
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new("0".to_string()));

        let current: i64 = entry.value.parse().map_err(|_| {
            StoreError::Command("value is not an integer or out of range".to_string())
        })?;
        let next = current + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        self.check_available()?;
        let mut entries = self.entries.lock().await;
        if let Some(entry) = live_entry(&mut entries, key) {
            entry.ttl = Some(seconds);
            entry.expires_at = Instant::now().checked_add(Duration::from_secs(seconds));
        }
        Ok(())
    }
}

/// Look up a key, dropping it first if its TTL has elapsed.
fn live_entry<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    if entries
        .get(key)
        .is_some_and(|e| e.is_expired(Instant::now()))
    {
        entries.remove(key);
        return None;
    }
    entries.get_mut(key)
}
