//! Engine configuration.
//!
//! Configuration is an explicit value passed to constructors; nothing here is
//! read lazily or cached globally.

use crate::rate_limit::Thresholds;
use std::time::Duration;

/// Environment variable holding the login threshold.
pub const ENV_LIMIT_LOGIN: &str = "BRUTEGUARD_LIMIT_LOGIN";
/// Environment variable holding the password threshold.
pub const ENV_LIMIT_PASSWORD: &str = "BRUTEGUARD_LIMIT_PASSWORD";
/// Environment variable holding the address threshold.
pub const ENV_LIMIT_ADDRESS: &str = "BRUTEGUARD_LIMIT_ADDRESS";
/// Environment variable holding the flush interval in seconds.
pub const ENV_RESET_INTERVAL_SECS: &str = "BRUTEGUARD_RESET_INTERVAL_SECS";

/// Errors produced when loading or validating configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Flush interval must be > 0.
    #[error("reset_interval must be > 0")]
    ZeroInterval,
    /// A variable was set but does not parse as an unsigned integer.
    #[error("{key} must be an unsigned integer (got {value:?})")]
    InvalidNumber {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },
    /// Background tasks need a Tokio runtime on the calling thread.
    #[error("periodic reset requires a running Tokio runtime")]
    NoRuntime,
}

/// Validated configuration for a [`DecisionEngine`](crate::engine::DecisionEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    thresholds: Thresholds,
    reset_interval: Duration,
}

impl Default for GuardConfig {
    /// 10 attempts per login, 100 per password, 1000 per address, flushed every minute.
    fn default() -> Self {
        Self { thresholds: Thresholds::default(), reset_interval: Duration::from_secs(60) }
    }
}

impl GuardConfig {
    /// Create a config with validation.
    pub fn new(thresholds: Thresholds, reset_interval: Duration) -> Result<Self, ConfigError> {
        if reset_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(Self { thresholds, reset_interval })
    }

    /// Load from the process environment, falling back to defaults for unset keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names.
    ///
    /// # Example
    /// ```
    /// use bruteguard::config::GuardConfig;
    /// let cfg = GuardConfig::from_lookup(|key| match key {
    ///     "BRUTEGUARD_LIMIT_LOGIN" => Some("5".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(cfg.thresholds().login, 5);
    /// assert_eq!(cfg.thresholds().password, 100);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &'static str, fallback: u64| -> Result<u64, ConfigError> {
            match lookup(key) {
                None => Ok(fallback),
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber { key, value: raw.clone() }),
            }
        };
        let thresholds = Thresholds {
            login: read(ENV_LIMIT_LOGIN, defaults.thresholds.login)?,
            password: read(ENV_LIMIT_PASSWORD, defaults.thresholds.password)?,
            address: read(ENV_LIMIT_ADDRESS, defaults.thresholds.address)?,
        };
        let secs = read(ENV_RESET_INTERVAL_SECS, defaults.reset_interval.as_secs())?;
        Self::new(thresholds, Duration::from_secs(secs))
    }

    /// Per-dimension limits.
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Period of the global counter flush.
    pub fn reset_interval(&self) -> Duration {
        self.reset_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = GuardConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, GuardConfig::default());
        assert_eq!(cfg.thresholds(), Thresholds::new(10, 100, 1000));
        assert_eq!(cfg.reset_interval(), Duration::from_secs(60));
    }

    #[test]
    fn reads_every_key() {
        let cfg = GuardConfig::from_lookup(lookup(&[
            (ENV_LIMIT_LOGIN, "3"),
            (ENV_LIMIT_PASSWORD, " 30 "),
            (ENV_LIMIT_ADDRESS, "300"),
            (ENV_RESET_INTERVAL_SECS, "5"),
        ]))
        .unwrap();
        assert_eq!(cfg.thresholds(), Thresholds::new(3, 30, 300));
        assert_eq!(cfg.reset_interval(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_garbage_and_zero_interval() {
        let err = GuardConfig::from_lookup(lookup(&[(ENV_LIMIT_LOGIN, "ten")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidNumber { key: ENV_LIMIT_LOGIN, value: "ten".into() });

        let err = GuardConfig::from_lookup(lookup(&[(ENV_RESET_INTERVAL_SECS, "0")])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroInterval);
        assert!(GuardConfig::new(Thresholds::default(), Duration::ZERO).is_err());
    }
}
