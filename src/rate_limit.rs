//! Threshold checks over attempt counters.
//!
//! The limiter increments first and compares afterwards, so the attempt that
//! crosses the threshold is itself counted. With threshold `N` the `N+1`-th
//! attempt is the first denied one and leaves the counter at `N+1`. Counters
//! are never rolled back; they only return to zero through a reset or flush.

use crate::counter::{CounterStore, Dimension, RateKey};
use crate::error::StoreError;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-dimension attempt limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Thresholds {
    /// Attempts allowed per login between flushes.
    pub login: u64,
    /// Attempts allowed per password between flushes.
    pub password: u64,
    /// Attempts allowed per source address between flushes.
    pub address: u64,
}

impl Thresholds {
    /// Build thresholds for all three dimensions.
    pub fn new(login: u64, password: u64, address: u64) -> Self {
        Self { login, password, address }
    }

    /// Limit for `dimension`.
    pub fn for_dimension(&self, dimension: Dimension) -> u64 {
        match dimension {
            Dimension::Login => self.login,
            Dimension::Password => self.password,
            Dimension::Address => self.address,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { login: 10, password: 100, address: 1000 }
    }
}

/// Outcome of a single dimension check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Counter is at or below the threshold.
    Within {
        /// Counter value after this attempt.
        count: u64,
        /// Configured limit.
        limit: u64,
    },
    /// Counter is above the threshold.
    Exceeded {
        /// Counter value after this attempt.
        count: u64,
        /// Configured limit.
        limit: u64,
    },
}

impl Verdict {
    /// Helper to check if allowed.
    pub fn is_within(&self) -> bool {
        matches!(self, Verdict::Within { .. })
    }

    /// Counter value after the attempt.
    pub fn count(&self) -> u64 {
        match self {
            Verdict::Within { count, .. } | Verdict::Exceeded { count, .. } => *count,
        }
    }
}

/// Applies [`Thresholds`] to counters held by a [`CounterStore`].
#[derive(Clone)]
pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
    thresholds: Thresholds,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("counters", &"<dyn CounterStore>")
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter over `counters`.
    pub fn new(counters: Arc<dyn CounterStore>, thresholds: Thresholds) -> Self {
        Self { counters, thresholds }
    }

    /// Configured limits.
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Count one attempt for `value` under `dimension` and compare the new
    /// value against the limit. Strictly greater than the limit is exceeded.
    pub async fn check(&self, dimension: Dimension, value: &str) -> Result<Verdict, StoreError> {
        let key = RateKey::new(dimension, value);
        let count = self.counters.increment_and_get(key.as_str()).await?;
        let limit = self.thresholds.for_dimension(dimension);
        if count > limit {
            tracing::debug!(target: "bruteguard::rate_limit", %dimension, count, limit, "threshold exceeded");
            Ok(Verdict::Exceeded { count, limit })
        } else {
            Ok(Verdict::Within { count, limit })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::InMemoryCounterStore;

    #[tokio::test]
    async fn n_plus_first_attempt_is_denied_and_counted() {
        let store = InMemoryCounterStore::new();
        let limiter = RateLimiter::new(Arc::new(store.clone()), Thresholds::new(3, 100, 1000));

        for expected in 1..=3 {
            let v = limiter.check(Dimension::Login, "bob").await.unwrap();
            assert_eq!(v, Verdict::Within { count: expected, limit: 3 });
        }
        let v = limiter.check(Dimension::Login, "bob").await.unwrap();
        assert_eq!(v, Verdict::Exceeded { count: 4, limit: 3 });
        assert_eq!(store.value("login:bob"), 4);

        // still counting while denied
        let v = limiter.check(Dimension::Login, "bob").await.unwrap();
        assert_eq!(v.count(), 5);
        assert!(!v.is_within());
    }

    #[tokio::test]
    async fn zero_threshold_denies_first_attempt() {
        let limiter =
            RateLimiter::new(Arc::new(InMemoryCounterStore::new()), Thresholds::new(0, 0, 0));
        assert!(!limiter.check(Dimension::Address, "10.0.0.1").await.unwrap().is_within());
    }

    #[tokio::test]
    async fn dimensions_are_independent() {
        let store = InMemoryCounterStore::new();
        let limiter = RateLimiter::new(Arc::new(store.clone()), Thresholds::new(1, 1, 1));
        assert!(limiter.check(Dimension::Login, "same").await.unwrap().is_within());
        assert!(limiter.check(Dimension::Password, "same").await.unwrap().is_within());
        assert!(limiter.check(Dimension::Address, "same").await.unwrap().is_within());
        assert_eq!(store.len(), 3);
    }
}
