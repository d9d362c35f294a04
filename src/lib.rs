#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]
#![warn(missing_docs)]

//! # bruteguard
//!
//! Brute-force mitigation for login endpoints. Every attempt is checked
//! against a deny list and an allow list of IPv4 subnets, then against three
//! independent attempt counters keyed by login, password and source address.
//! Counters are flushed on a fixed interval.
//!
//! ## Features
//!
//! - **Subnet lists** with exact-pair administration and containment matching
//! - **Rate counters** per login, per password and per address
//! - **Periodic reset** on a Tokio interval, plus single-key operator resets
//! - **Pluggable storage** behind [`ListStore`] and [`CounterStore`]
//! - **Tower middleware** that gates login handlers
//! - **Control plane** (feature `control`) for operator commands with audit
//!
//! ## Quick Start
//!
//! ```rust
//! use bruteguard::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GuardError> {
//!     let config = GuardConfig::default();
//!     let engine = DecisionEngine::from_config(
//!         &config,
//!         Arc::new(InMemoryListStore::new()),
//!         Arc::new(InMemoryCounterStore::new()),
//!     );
//!     let reset = engine.start_periodic_reset(config.reset_interval())?;
//!
//!     let decision = engine.evaluate("alice", "correct horse", "203.0.113.10").await?;
//!     assert!(decision.allowed);
//!     assert_eq!(decision.reason.to_string(), "Check successful");
//!
//!     reset.cancel().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod counter;
pub mod engine;
pub mod error;
pub mod list;
pub mod middleware;
pub mod prelude;
pub mod rate_limit;
pub mod reset;
pub mod telemetry;

#[cfg(feature = "control")]
pub mod control;

// Re-exports
pub use config::{ConfigError, GuardConfig};
pub use counter::{CounterStore, Dimension, InMemoryCounterStore, RateKey};
pub use engine::{Decision, DecisionEngine, Reason};
pub use error::{GuardError, StoreError, ValidationError};
pub use list::{AddressEntry, Cidr, InMemoryListStore, ListKind, ListStore};
pub use middleware::{GateError, GuardLayer, GuardService, LoginAttempt};
pub use rate_limit::{RateLimiter, Thresholds, Verdict};
pub use reset::{ResetHandle, ResetScheduler};
pub use telemetry::{GuardEvent, LogSink, MemorySink, NullSink, TelemetrySink};
