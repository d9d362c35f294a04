//! Convenient re-exports for common bruteguard types.
pub use crate::{
    config::{ConfigError, GuardConfig},
    counter::{CounterStore, Dimension, InMemoryCounterStore},
    engine::{Decision, DecisionEngine, Reason},
    error::{GuardError, StoreError, ValidationError},
    list::{AddressEntry, Cidr, InMemoryListStore, ListKind, ListStore},
    middleware::{GateError, GuardLayer, GuardService, LoginAttempt},
    rate_limit::Thresholds,
    reset::ResetHandle,
    telemetry::{GuardEvent, LogSink, MemorySink, NullSink, TelemetrySink},
};
