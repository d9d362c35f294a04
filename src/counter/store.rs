//! Counter persistence: the [`CounterStore`] contract and an in-memory implementation.

use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Abstract storage interface for attempt counters.
///
/// Designed for both in-memory and distributed backends. Absent keys read as 0.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key` and return the new value.
    ///
    /// Must be linearizable per key: concurrent increments never lose updates.
    async fn increment_and_get(&self, key: &str) -> Result<u64, StoreError>;

    /// Overwrite `key`. Used for explicit resets to 0.
    async fn set_value(&self, key: &str, value: u64) -> Result<(), StoreError>;

    /// Reset every counter.
    async fn flush_all(&self) -> Result<(), StoreError>;
}

/// Simple in-memory counter store.
#[derive(Default, Clone, Debug)]
pub struct InMemoryCounterStore {
    data: Arc<Mutex<HashMap<String, u64>>>,
}

impl InMemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key`, 0 when absent.
    pub fn value(&self, key: &str) -> u64 {
        self.data
            .lock()
            .map(|guard| guard.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.data.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Whether no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("counter store lock poisoned".into())
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment_and_get(&self, key: &str) -> Result<u64, StoreError> {
        let mut guard = self.data.lock().map_err(|_| poisoned())?;
        let slot = guard.entry(key.to_string()).or_insert(0);
        *slot = slot.saturating_add(1);
        Ok(*slot)
    }

    async fn set_value(&self, key: &str, value: u64) -> Result<(), StoreError> {
        let mut guard = self.data.lock().map_err(|_| poisoned())?;
        guard.insert(key.to_string(), value);
        Ok(())
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        let mut guard = self.data.lock().map_err(|_| poisoned())?;
        guard.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increments_from_zero() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.value("login:a"), 0);
        assert_eq!(store.increment_and_get("login:a").await, Ok(1));
        assert_eq!(store.increment_and_get("login:a").await, Ok(2));
        assert_eq!(store.increment_and_get("login:b").await, Ok(1));
    }

    #[tokio::test]
    async fn set_and_flush() {
        let store = InMemoryCounterStore::new();
        store.increment_and_get("k").await.unwrap();
        store.set_value("k", 0).await.unwrap();
        assert_eq!(store.value("k"), 0);
        assert_eq!(store.increment_and_get("k").await, Ok(1));

        store.increment_and_get("other").await.unwrap();
        store.flush_all().await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.increment_and_get("k").await, Ok(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let store = InMemoryCounterStore::new();
        let mut handles = Vec::new();
        for _ in 0..200 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.increment_and_get("hot").await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(store.value("hot"), 200);
    }
}
