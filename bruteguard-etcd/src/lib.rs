//! etcd-backed [`CounterStore`] for `bruteguard` (companion crate).
//! Bring your own `etcd_client::Client`; counters live as decimal strings under
//! `prefix/<key>`.
//!
//! Increments are optimistic: read the key, then write `value + 1` in a
//! transaction guarded on the key's `mod_revision` (or on its absence). A lost
//! race re-reads and retries, up to a bounded number of attempts.

use async_trait::async_trait;
use bruteguard::counter::CounterStore;
use bruteguard::error::StoreError;
use etcd_client::{Client, Compare, CompareOp, DeleteOptions, KeyValue, Txn, TxnOp};

/// Attempts per increment before giving up with [`StoreError::Contention`].
pub const DEFAULT_MAX_ATTEMPTS: usize = 16;

/// Rejected key prefix.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PrefixError {
    /// Nothing left after trimming.
    #[error("prefix cannot be empty")]
    Empty,
    /// Contains a control character.
    #[error("prefix cannot contain control characters")]
    ControlCharacter,
}

/// Attempt counters stored in etcd.
#[derive(Clone)]
pub struct EtcdCounterStore {
    prefix: String,
    client: Client,
    max_attempts: usize,
}

impl std::fmt::Debug for EtcdCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtcdCounterStore")
            .field("prefix", &self.prefix)
            .field("client", &"<etcd_client::Client>")
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

fn unavailable(err: etcd_client::Error) -> StoreError {
    tracing::warn!(target: "bruteguard::etcd", error = %err, "etcd request failed");
    StoreError::Unavailable(err.to_string())
}

fn decode(kv: &KeyValue) -> Result<u64, StoreError> {
    let raw = kv.value_str().map_err(|e| StoreError::Corrupt(e.to_string()))?;
    raw.parse().map_err(|_| StoreError::Corrupt(format!("counter value {raw:?} is not a number")))
}

impl EtcdCounterStore {
    /// Create a store using an existing etcd client; keys will be `prefix/<key>`.
    pub fn new(prefix: impl Into<String>, client: Client) -> Result<Self, PrefixError> {
        let prefix: String = prefix.into();
        let prefix = prefix.trim().trim_end_matches('/').to_string();

        if prefix.is_empty() {
            return Err(PrefixError::Empty);
        }
        if prefix.chars().any(|c| c.is_control()) {
            return Err(PrefixError::ControlCharacter);
        }
        Ok(Self { prefix, client, max_attempts: DEFAULT_MAX_ATTEMPTS })
    }

    /// Override the number of optimistic attempts per increment (at least one).
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Normalised prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}/{}", self.prefix, key)
    }
}

#[async_trait]
impl CounterStore for EtcdCounterStore {
    async fn increment_and_get(&self, key: &str) -> Result<u64, StoreError> {
        let full = self.full_key(key);
        let mut client = self.client.clone();

        for attempt in 1..=self.max_attempts {
            let resp = client.get(full.as_str(), None).await.map_err(unavailable)?;
            let (current, guard) = match resp.kvs().first() {
                Some(kv) => (
                    decode(kv)?,
                    Compare::mod_revision(full.as_str(), CompareOp::Equal, kv.mod_revision()),
                ),
                None => (0, Compare::version(full.as_str(), CompareOp::Equal, 0)),
            };
            let next = current.saturating_add(1);
            let txn = Txn::new()
                .when(vec![guard])
                .and_then(vec![TxnOp::put(full.as_str(), next.to_string(), None)]);

            if client.txn(txn).await.map_err(unavailable)?.succeeded() {
                return Ok(next);
            }
            tracing::debug!(target: "bruteguard::etcd", key = %full, attempt, "increment lost a race, retrying");
        }
        Err(StoreError::Contention { key: key.to_string(), attempts: self.max_attempts })
    }

    async fn set_value(&self, key: &str, value: u64) -> Result<(), StoreError> {
        let mut client = self.client.clone();
        client.put(self.full_key(key), value.to_string(), None).await.map_err(unavailable)?;
        Ok(())
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        let mut client = self.client.clone();
        let scope = format!("{}/", self.prefix);
        client
            .delete(scope, Some(DeleteOptions::new().with_prefix()))
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
