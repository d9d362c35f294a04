//! Counter resets: the periodic global flush and operator single-key overrides.
//!
//! The flush runs on a Tokio interval in its own task and is not coordinated
//! with in-flight evaluations; a flush racing an increment on the same key
//! resolves to whichever the counter store applies first.

use crate::config::ConfigError;
use crate::counter::{CounterStore, Dimension, RateKey};
use crate::error::{GuardError, StoreError, ValidationError};
use crate::list::parse_address;
use crate::telemetry::{emit_best_effort, GuardEvent, NullSink, TelemetrySink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Handle to a running periodic flush.
///
/// [`cancel`](ResetHandle::cancel) stops the task and waits for it, so no flush
/// starts after it returns. Dropping the handle also stops the task, without
/// waiting for a flush already in progress.
#[derive(Debug)]
pub struct ResetHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ResetHandle {
    /// Stop the periodic flush and wait until the task has exited.
    pub async fn cancel(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

/// Owns counter resets for a [`CounterStore`].
#[derive(Clone)]
pub struct ResetScheduler<S = NullSink> {
    counters: Arc<dyn CounterStore>,
    sink: S,
}

impl<S> std::fmt::Debug for ResetScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetScheduler").field("counters", &"<dyn CounterStore>").finish()
    }
}

impl ResetScheduler<NullSink> {
    /// Create a scheduler over `counters` without telemetry.
    pub fn new(counters: Arc<dyn CounterStore>) -> Self {
        Self { counters, sink: NullSink }
    }
}

impl<S> ResetScheduler<S> {
    /// Replace the telemetry sink.
    pub fn with_sink<T>(self, sink: T) -> ResetScheduler<T> {
        ResetScheduler { counters: self.counters, sink }
    }
}

impl<S> ResetScheduler<S>
where
    S: TelemetrySink,
    <S as tower::Service<GuardEvent>>::Future: Send + 'static,
{
    /// Zero the login counter for `login`.
    pub async fn reset_login(&self, login: &str) -> Result<(), GuardError> {
        if login.is_empty() {
            return Err(ValidationError::EmptyLogin.into());
        }
        self.reset_key(Dimension::Login, login).await
    }

    /// Zero the address counter for `address`.
    pub async fn reset_address(&self, address: &str) -> Result<(), GuardError> {
        parse_address(address)?;
        self.reset_key(Dimension::Address, address).await
    }

    async fn reset_key(&self, dimension: Dimension, value: &str) -> Result<(), GuardError> {
        let key = RateKey::new(dimension, value);
        if let Err(e) = self.counters.set_value(key.as_str(), 0).await {
            warn!(target: "bruteguard::reset", %dimension, error = %e, "counter reset failed");
            return Err(e.into());
        }
        info!(target: "bruteguard::reset", %dimension, "counter reset");
        emit_best_effort(self.sink.clone(), GuardEvent::CounterReset { dimension }).await;
        Ok(())
    }

    /// Flush every counter once, outside the periodic schedule.
    pub async fn flush_now(&self) -> Result<(), StoreError> {
        flush_once(self.counters.as_ref(), self.sink.clone()).await
    }

    /// Spawn the periodic flush. The first flush happens one `interval` from now.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, interval: Duration) -> Result<ResetHandle, GuardError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval.into());
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = runtime.spawn(run_periodic(
            self.counters.clone(),
            self.sink.clone(),
            interval,
            stop_rx,
        ));
        Ok(ResetHandle { stop: Some(stop_tx), task: Some(task) })
    }
}

async fn flush_once<S>(counters: &dyn CounterStore, sink: S) -> Result<(), StoreError>
where
    S: TelemetrySink,
    <S as tower::Service<GuardEvent>>::Future: Send + 'static,
{
    match counters.flush_all().await {
        Ok(()) => {
            info!(target: "bruteguard::reset", "counters flushed");
            emit_best_effort(sink, GuardEvent::CountersFlushed).await;
            Ok(())
        }
        Err(e) => {
            warn!(target: "bruteguard::reset", error = %e, "counter flush failed");
            emit_best_effort(sink, GuardEvent::FlushFailed).await;
            Err(e)
        }
    }
}

async fn run_periodic<S>(
    counters: Arc<dyn CounterStore>,
    sink: S,
    period: Duration,
    mut stop: oneshot::Receiver<()>,
) where
    S: TelemetrySink,
    <S as tower::Service<GuardEvent>>::Future: Send + 'static,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(target: "bruteguard::reset", period_ms = period.as_millis() as u64, "periodic counter reset started");
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {
                // a failed flush is retried on the next tick
                let _ = flush_once(counters.as_ref(), sink.clone()).await;
            }
        }
    }
    info!(target: "bruteguard::reset", "periodic counter reset stopped");
}
