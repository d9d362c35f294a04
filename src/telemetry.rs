//! Telemetry for guard decisions and administrative changes.
//!
//! Every evaluation, list mutation, counter reset and periodic flush emits a
//! [`GuardEvent`]. Events flow through [`TelemetrySink`] implementations, which
//! are plain `tower::Service<GuardEvent>` values so they compose with standard
//! tower combinators.
//!
//! Events never carry the login or password of an attempt.
//!
//! ```rust
//! use bruteguard::telemetry::{GuardEvent, MemorySink};
//! use bruteguard::engine::Reason;
//!
//! let sink = MemorySink::new();
//! let event = GuardEvent::Evaluated { allowed: false, reason: Reason::LoginRate };
//! assert_eq!(event.to_string(), "evaluated: denied (Limited by login rate)");
//! assert!(sink.is_empty());
//! ```

use crate::counter::Dimension;
use crate::engine::Reason;
use crate::list::{Cidr, ListKind};
use futures::future::BoxFuture;
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A telemetry sink that consumes guard events.
pub trait TelemetrySink:
    tower::Service<GuardEvent, Response = (), Error = Self::SinkError> + Clone + Send + Sync + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

/// Best-effort emit helper that honors `poll_ready` and swallows errors.
///
/// Telemetry never fails an evaluation: if a sink is not ready or returns an
/// error, the event is dropped.
pub async fn emit_best_effort<S>(sink: S, event: GuardEvent)
where
    S: tower::Service<GuardEvent, Response = ()> + Send + Clone + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    use tower::ServiceExt;

    if let Ok(mut ready_sink) = sink.ready_oneshot().await {
        let _ = ready_sink.call(event).await;
    }
}

/// Kind of list mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChange {
    /// Subnet inserted with the given id.
    Added {
        /// Assigned id.
        id: u64,
    },
    /// Subnet removed.
    Removed,
}

/// Events emitted by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEvent {
    /// An attempt was evaluated.
    Evaluated {
        /// Whether the attempt may proceed.
        allowed: bool,
        /// Why.
        reason: Reason,
    },
    /// An allow/deny list was modified.
    ListChanged {
        /// Target list.
        list: ListKind,
        /// Exact subnet.
        subnet: Cidr,
        /// What happened.
        change: ListChange,
    },
    /// A single counter was zeroed by an operator.
    CounterReset {
        /// Dimension of the zeroed counter.
        dimension: Dimension,
    },
    /// The periodic flush cleared every counter.
    CountersFlushed,
    /// The periodic flush failed; counters keep their values until the next tick.
    FlushFailed,
}

impl fmt::Display for GuardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardEvent::Evaluated { allowed, reason } => {
                let verdict = if *allowed { "allowed" } else { "denied" };
                write!(f, "evaluated: {} ({})", verdict, reason)
            }
            GuardEvent::ListChanged { list, subnet, change } => match change {
                ListChange::Added { id } => write!(f, "{} list: added {} (id {})", list, subnet, id),
                ListChange::Removed => write!(f, "{} list: removed {}", list, subnet),
            },
            GuardEvent::CounterReset { dimension } => write!(f, "{} counter reset", dimension),
            GuardEvent::CountersFlushed => f.write_str("counters flushed"),
            GuardEvent::FlushFailed => f.write_str("counter flush failed"),
        }
    }
}

type SinkFuture = BoxFuture<'static, Result<(), Infallible>>;

/// A no-op telemetry sink that discards all events.
#[derive(Clone, Debug, Default)]
pub struct NullSink;

impl Service<GuardEvent> for NullSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _event: GuardEvent) -> Self::Future {
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for NullSink {
    type SinkError = Infallible;
}

/// A telemetry sink that logs events using the `tracing` crate.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl Service<GuardEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: GuardEvent) -> Self::Future {
        match &event {
            GuardEvent::FlushFailed => tracing::warn!(target: "bruteguard::telemetry", event = %event, "guard_event"),
            _ => tracing::info!(target: "bruteguard::telemetry", event = %event, "guard_event"),
        }
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for LogSink {
    type SinkError = Infallible;
}

/// A telemetry sink that stores events in memory, evicting the oldest beyond capacity.
#[derive(Clone, Debug)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<GuardEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    /// Sink holding up to 10 000 events.
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Sink holding up to `capacity` events (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Snapshot of stored events, oldest first.
    pub fn events(&self) -> Vec<GuardEvent> {
        self.events.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Drop all stored events.
    pub fn clear(&self) {
        if let Ok(mut g) = self.events.lock() {
            g.clear();
        }
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.lock().map(|g| g.len()).unwrap_or(0)
    }

    /// Whether no event is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events dropped because the sink was full.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl Service<GuardEvent> for MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: GuardEvent) -> Self::Future {
        if let Ok(mut events) = self.events.lock() {
            if events.len() >= self.capacity {
                events.remove(0);
                self.evicted.fetch_add(1, Ordering::Relaxed);
            }
            events.push(event);
        }
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for MemorySink {
    type SinkError = Infallible;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_evicts_oldest() {
        let sink = MemorySink::with_capacity(2);
        emit_best_effort(sink.clone(), GuardEvent::CountersFlushed).await;
        emit_best_effort(sink.clone(), GuardEvent::CounterReset { dimension: Dimension::Login })
            .await;
        emit_best_effort(sink.clone(), GuardEvent::FlushFailed).await;

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.evicted(), 1);
        assert_eq!(
            sink.events(),
            vec![GuardEvent::CounterReset { dimension: Dimension::Login }, GuardEvent::FlushFailed]
        );
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn list_events_render_subnet_and_id() {
        let event = GuardEvent::ListChanged {
            list: ListKind::Deny,
            subnet: "10.0.0.0/8".parse().unwrap(),
            change: ListChange::Added { id: 7 },
        };
        assert_eq!(event.to_string(), "deny list: added 10.0.0.0/8 (id 7)");
    }

    #[tokio::test]
    async fn null_and_log_sinks_accept_events() {
        emit_best_effort(NullSink, GuardEvent::CountersFlushed).await;
        emit_best_effort(LogSink, GuardEvent::FlushFailed).await;
    }
}
