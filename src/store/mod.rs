//! Atomic counter store protocol.
//!
//! # Responsibilities
//! - Define the external atomic counter protocol used by the spend limit
//!   guard and the store-backed nonce manager
//! - Provide an in-memory implementation for tests and single-node deployments
//!
//! # Design Decisions
//! - The protocol is the minimal Redis-shaped surface the core needs:
//!   `get`, `incrby`, `expire`, and an atomic raise-to-floor (`set_max`,
//!   a small Lua script on a real Redis). Production deployments implement
//!   it over their shared store; this crate stays transport-agnostic.
//! - Every operation is atomic with respect to concurrent callers. That
//!   atomicity is what makes increment-then-check spend reservation race-free.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Errors surfaced by a counter store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is unreachable or rejected the command.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for counter store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// External atomic counter store.
///
/// `incr_by` must be atomic and its result visible to the next caller;
/// callers rely on this for race-free budget reservation and nonce
/// allocation.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a key's current value, if present and unexpired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Atomically add `delta` to a key (creating it at zero) and return the
    /// new value.
    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64>;

    /// Atomically raise a key to at least `floor` (creating it at `floor`),
    /// returning the stored value. A key already at or above `floor` is
    /// left unchanged.
    async fn set_max(&self, key: &str, floor: i64) -> StoreResult<i64>;

    /// Set or refresh a key's expiry. Returns false when the key is absent.
    async fn expire(&self, key: &str, seconds: u64) -> StoreResult<bool>;
}

#[derive(Debug, Clone)]
struct CounterEntry {
    value: i64,
    expires_at: Option<Instant>,
}

impl CounterEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// In-memory counter store.
///
/// Suitable for tests and single-process deployments; multi-process
/// deployments need a shared store behind the same protocol.
#[derive(Default)]
pub struct InMemoryCounterStore {
    entries: DashMap<String, CounterEntry>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value.to_string())),
            Some(_) => {
                drop(self.entries.remove(key));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let mut entry = self.entries.entry(key.to_string()).or_insert(CounterEntry {
            value: 0,
            expires_at: None,
        });
        if entry.is_expired() {
            entry.value = 0;
            entry.expires_at = None;
        }
        entry.value += delta;
        Ok(entry.value)
    }

    async fn set_max(&self, key: &str, floor: i64) -> StoreResult<i64> {
        let mut entry = self.entries.entry(key.to_string()).or_insert(CounterEntry {
            value: floor,
            expires_at: None,
        });
        if entry.is_expired() {
            entry.value = floor;
            entry.expires_at = None;
        }
        entry.value = entry.value.max(floor);
        Ok(entry.value)
    }

    async fn expire(&self, key: &str, seconds: u64) -> StoreResult<bool> {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_incr_creates_and_accumulates() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.incr_by("k", 5).await.unwrap(), 5);
        assert_eq!(store.incr_by("k", 3).await.unwrap(), 8);
        assert_eq!(store.get("k").await.unwrap(), Some("8".to_string()));
    }

    #[tokio::test]
    async fn test_negative_delta_rolls_back() {
        let store = InMemoryCounterStore::new();
        store.incr_by("k", 100).await.unwrap();
        assert_eq!(store.incr_by("k", -40).await.unwrap(), 60);
    }

    #[tokio::test]
    async fn test_set_max_raises_but_never_lowers() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.set_max("k", 10).await.unwrap(), 10);
        assert_eq!(store.set_max("k", 5).await.unwrap(), 10);
        assert_eq!(store.set_max("k", 12).await.unwrap(), 12);
        store.incr_by("k", 1).await.unwrap();
        assert_eq!(store.set_max("k", 12).await.unwrap(), 13);
    }

    #[tokio::test]
    async fn test_expire_missing_key() {
        let store = InMemoryCounterStore::new();
        assert!(!store.expire("missing", 60).await.unwrap());
        store.incr_by("present", 1).await.unwrap();
        assert!(store.expire("present", 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_atomic() {
        let store = Arc::new(InMemoryCounterStore::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    store.incr_by("shared", 1).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get("shared").await.unwrap(), Some("3200".to_string()));
    }
}
