//! Per-dimension attempt counters.
//!
//! - [`Dimension`]: the three independent rate axes (login, password, address).
//! - [`RateKey`]: the counter key for one raw value under one dimension.
//! - [`store::CounterStore`]: atomic counters, in memory or remote.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod store;

pub use store::{CounterStore, InMemoryCounterStore};

/// One of the rate-limiting axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dimension {
    /// The login name.
    Login,
    /// The password value.
    Password,
    /// The source address.
    Address,
}

impl Dimension {
    /// Evaluation order used by the engine.
    pub const ORDER: [Dimension; 3] = [Dimension::Login, Dimension::Password, Dimension::Address];

    /// Tag prefixed to every key of this dimension.
    pub fn tag(self) -> &'static str {
        match self {
            Dimension::Login => "login",
            Dimension::Password => "password",
            Dimension::Address => "address",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Counter key: dimension tag plus the raw attempt value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey(String);

impl RateKey {
    /// Build the key for `value` under `dimension`.
    pub fn new(dimension: Dimension, value: &str) -> Self {
        let tag = dimension.tag();
        let mut key = String::with_capacity(tag.len() + 1 + value.len());
        key.push_str(tag);
        key.push(':');
        key.push_str(value);
        Self(key)
    }

    /// Key text as handed to the counter store.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
