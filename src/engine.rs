//! The decision engine: list checks first, then rate limits.
//!
//! Each [`DecisionEngine::evaluate`] call runs a fixed sequence and stops at
//! the first step with an outcome:
//!
//! 1. validate login, password and address (no side effects on failure)
//! 2. deny list containment → denied, no counters touched
//! 3. allow list containment → allowed, no counters touched
//! 4. login counter → denied if over the limit
//! 5. password counter → denied if over the limit
//! 6. address counter → denied if over the limit
//! 7. allowed
//!
//! Steps 4–6 increment in that order and stop at the first denial, so a call
//! denied on login leaves the password and address counters untouched.
//!
//! ```rust
//! use bruteguard::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GuardError> {
//!     let engine = DecisionEngine::new(
//!         Arc::new(InMemoryListStore::new()),
//!         Arc::new(InMemoryCounterStore::new()),
//!         Thresholds::new(1, 100, 1000),
//!     );
//!     engine.add_address(ListKind::Deny, "10.0.0.0", 8).await?;
//!
//!     let d = engine.evaluate("alice", "secret", "10.1.2.3").await?;
//!     assert_eq!(d.reason, Reason::Denylisted);
//!
//!     assert!(engine.evaluate("alice", "secret", "192.0.2.1").await?.allowed);
//!     assert_eq!(engine.evaluate("alice", "secret", "192.0.2.1").await?.reason, Reason::LoginRate);
//!     Ok(())
//! }
//! ```

use crate::config::GuardConfig;
use crate::counter::{CounterStore, Dimension};
use crate::error::{GuardError, ValidationError};
use crate::list::{parse_address, subnet, AddressEntry, Cidr, ListKind, ListStore};
use crate::rate_limit::{RateLimiter, Thresholds};
use crate::reset::{ResetHandle, ResetScheduler};
use crate::telemetry::{emit_best_effort, GuardEvent, ListChange, NullSink, TelemetrySink};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why an attempt was allowed or denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Reason {
    /// Source address is inside a deny list subnet.
    Denylisted,
    /// Source address is inside an allow list subnet.
    Allowlisted,
    /// Too many attempts for this login.
    LoginRate,
    /// Too many attempts with this password.
    PasswordRate,
    /// Too many attempts from this address.
    AddressRate,
    /// Every check passed.
    Passed,
}

impl Reason {
    /// Human-readable message.
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::Denylisted => "IP is in blacklist",
            Reason::Allowlisted => "IP is in whitelist",
            Reason::LoginRate => "Limited by login rate",
            Reason::PasswordRate => "Limited by password rate",
            Reason::AddressRate => "Limited by IP rate",
            Reason::Passed => "Check successful",
        }
    }

    fn for_dimension(dimension: Dimension) -> Self {
        match dimension {
            Dimension::Login => Reason::LoginRate,
            Dimension::Password => Reason::PasswordRate,
            Dimension::Address => Reason::AddressRate,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one evaluation. Produced fresh per call, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Decision {
    /// Whether the login attempt may proceed.
    pub allowed: bool,
    /// Why.
    pub reason: Reason,
}

impl Decision {
    fn allow(reason: Reason) -> Self {
        Self { allowed: true, reason }
    }

    fn deny(reason: Reason) -> Self {
        Self { allowed: false, reason }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.allowed { "allowed" } else { "denied" };
        write!(f, "{}: {}", verdict, self.reason)
    }
}

/// Validate an attempt before anything is looked up or counted.
fn validate_attempt(login: &str, password: &str, address: &str) -> Result<Ipv4Addr, ValidationError> {
    if login.is_empty() {
        return Err(ValidationError::EmptyLogin);
    }
    if password.is_empty() {
        return Err(ValidationError::EmptyPassword);
    }
    parse_address(address)
}

/// Orchestrates list lookups and rate limits into a single [`Decision`].
///
/// The engine keeps no state of its own between calls: lists live in the
/// [`ListStore`] and counters in the [`CounterStore`]. Share it behind an `Arc`
/// to serve concurrent evaluations.
pub struct DecisionEngine<S = NullSink> {
    lists: Arc<dyn ListStore>,
    limiter: RateLimiter,
    resets: ResetScheduler<S>,
    sink: S,
}

impl<S> fmt::Debug for DecisionEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("lists", &"<dyn ListStore>")
            .field("limiter", &self.limiter)
            .finish()
    }
}

impl DecisionEngine<NullSink> {
    /// Create an engine over the given stores.
    pub fn new(
        lists: Arc<dyn ListStore>,
        counters: Arc<dyn CounterStore>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            lists,
            limiter: RateLimiter::new(counters.clone(), thresholds),
            resets: ResetScheduler::new(counters),
            sink: NullSink,
        }
    }

    /// Create an engine using the thresholds from `config`.
    ///
    /// The flush interval is not started here; pass
    /// [`GuardConfig::reset_interval`] to [`DecisionEngine::start_periodic_reset`].
    pub fn from_config(
        config: &GuardConfig,
        lists: Arc<dyn ListStore>,
        counters: Arc<dyn CounterStore>,
    ) -> Self {
        Self::new(lists, counters, config.thresholds())
    }
}

impl<S> DecisionEngine<S> {
    /// Replace the telemetry sink.
    pub fn with_sink<T: Clone>(self, sink: T) -> DecisionEngine<T> {
        DecisionEngine {
            lists: self.lists,
            limiter: self.limiter,
            resets: self.resets.with_sink(sink.clone()),
            sink,
        }
    }

    /// Configured limits.
    pub fn thresholds(&self) -> Thresholds {
        self.limiter.thresholds()
    }
}

impl<S> DecisionEngine<S>
where
    S: TelemetrySink,
    <S as tower::Service<GuardEvent>>::Future: Send + 'static,
{
    /// Decide whether a login attempt may proceed.
    ///
    /// Returns `Err` only when the attempt is malformed or a store failed; a
    /// denied attempt is `Ok` with `allowed == false`.
    pub async fn evaluate(
        &self,
        login: &str,
        password: &str,
        address: &str,
    ) -> Result<Decision, GuardError> {
        let ip = validate_attempt(login, password, address)?;
        let decision = match self.decide(login, password, address, ip).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(target: "bruteguard::engine", %address, error = %e, "evaluation failed");
                return Err(e);
            }
        };
        debug!(target: "bruteguard::engine", %address, allowed = decision.allowed, reason = %decision.reason, "evaluated");
        emit_best_effort(
            self.sink.clone(),
            GuardEvent::Evaluated { allowed: decision.allowed, reason: decision.reason },
        )
        .await;
        Ok(decision)
    }

    async fn decide(
        &self,
        login: &str,
        password: &str,
        address: &str,
        ip: Ipv4Addr,
    ) -> Result<Decision, GuardError> {
        if self.contains(ListKind::Deny, ip).await? {
            return Ok(Decision::deny(Reason::Denylisted));
        }
        if self.contains(ListKind::Allow, ip).await? {
            return Ok(Decision::allow(Reason::Allowlisted));
        }
        for (dimension, value) in Dimension::ORDER.into_iter().zip([login, password, address]) {
            if !self.limiter.check(dimension, value).await?.is_within() {
                return Ok(Decision::deny(Reason::for_dimension(dimension)));
            }
        }
        Ok(Decision::allow(Reason::Passed))
    }

    async fn contains(&self, list: ListKind, ip: Ipv4Addr) -> Result<bool, GuardError> {
        let snapshot = self.lists.enumerate(list).await?;
        Ok(subnet::contains_any(ip, &snapshot))
    }

    /// Whether `address` falls inside any subnet of `list`.
    pub async fn is_address_in_list(&self, list: ListKind, address: &str) -> Result<bool, GuardError> {
        let ip = parse_address(address)?;
        self.contains(list, ip).await
    }

    /// Add the exact pair `ip/mask` to `list` and return its id.
    pub async fn add_address(&self, list: ListKind, ip: &str, mask: u8) -> Result<u64, GuardError> {
        let subnet = Cidr::new(ip, mask)?;
        let id = match self.lists.add(list, subnet).await {
            Ok(id) => id,
            Err(e) => {
                warn!(target: "bruteguard::engine", %list, %subnet, error = %e, "add to list failed");
                return Err(e.into());
            }
        };
        info!(target: "bruteguard::engine", %list, %subnet, id, "subnet added");
        emit_best_effort(
            self.sink.clone(),
            GuardEvent::ListChanged { list, subnet, change: ListChange::Added { id } },
        )
        .await;
        Ok(id)
    }

    /// Remove the exact pair `ip/mask` from `list`.
    pub async fn remove_address(&self, list: ListKind, ip: &str, mask: u8) -> Result<(), GuardError> {
        let subnet = Cidr::new(ip, mask)?;
        if let Err(e) = self.lists.remove(list, subnet).await {
            warn!(target: "bruteguard::engine", %list, %subnet, error = %e, "remove from list failed");
            return Err(e.into());
        }
        info!(target: "bruteguard::engine", %list, %subnet, "subnet removed");
        emit_best_effort(
            self.sink.clone(),
            GuardEvent::ListChanged { list, subnet, change: ListChange::Removed },
        )
        .await;
        Ok(())
    }

    /// Exact-pair membership of `ip/mask` in `list`.
    pub async fn is_address_listed_exact(
        &self,
        list: ListKind,
        ip: &str,
        mask: u8,
    ) -> Result<bool, GuardError> {
        let subnet = Cidr::new(ip, mask)?;
        Ok(self.lists.contains_exact(list, subnet).await?)
    }

    /// Every entry of `list`, ordered by id.
    pub async fn list_all(&self, list: ListKind) -> Result<Vec<AddressEntry>, GuardError> {
        Ok(self.lists.enumerate(list).await?)
    }

    /// Zero the login counter for `login`.
    pub async fn reset_login(&self, login: &str) -> Result<(), GuardError> {
        self.resets.reset_login(login).await
    }

    /// Zero the address counter for `address`.
    pub async fn reset_address(&self, address: &str) -> Result<(), GuardError> {
        self.resets.reset_address(address).await
    }

    /// Flush every counter now.
    pub async fn flush_counters(&self) -> Result<(), GuardError> {
        Ok(self.resets.flush_now().await?)
    }

    /// Start the periodic global flush. Stop it with [`ResetHandle::cancel`].
    pub fn start_periodic_reset(&self, interval: Duration) -> Result<ResetHandle, GuardError> {
        self.resets.start(interval)
    }
}
