//! Tower middleware that gates login handlers on a [`DecisionEngine`].
//!
//! ```rust
//! use bruteguard::prelude::*;
//! use std::sync::Arc;
//! use tower::{service_fn, Layer, ServiceExt};
//!
//! struct Login { user: String, pass: String, ip: String }
//!
//! impl LoginAttempt for Login {
//!     fn login(&self) -> &str { &self.user }
//!     fn password(&self) -> &str { &self.pass }
//!     fn address(&self) -> &str { &self.ip }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = Arc::new(DecisionEngine::new(
//!     Arc::new(InMemoryListStore::new()),
//!     Arc::new(InMemoryCounterStore::new()),
//!     Thresholds::default(),
//! ));
//! let handler = service_fn(|req: Login| async move {
//!     Ok::<_, std::io::Error>(format!("welcome {}", req.user))
//! });
//! let svc = GuardLayer::new(engine).layer(handler);
//! let reply = svc
//!     .oneshot(Login { user: "ann".into(), pass: "pw".into(), ip: "192.0.2.7".into() })
//!     .await
//!     .unwrap();
//! assert_eq!(reply, "welcome ann");
//! # }
//! ```

use crate::engine::{DecisionEngine, Reason};
use crate::error::GuardError;
use crate::telemetry::{GuardEvent, NullSink, TelemetrySink};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A request that carries the credentials of one login attempt.
pub trait LoginAttempt {
    /// Login name.
    fn login(&self) -> &str;
    /// Password as submitted.
    fn password(&self) -> &str;
    /// Dotted-decimal IPv4 source address.
    fn address(&self) -> &str;
}

/// Errors produced by [`GuardService`].
#[derive(thiserror::Error, Debug)]
pub enum GateError<E> {
    /// The engine denied the attempt; the inner service was not called.
    #[error("login attempt denied: {reason}")]
    Denied {
        /// Why.
        reason: Reason,
    },
    /// The engine could not evaluate the attempt.
    #[error(transparent)]
    Guard(GuardError),
    /// The inner service failed.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> GateError<E> {
    /// Check if the attempt was denied by the engine.
    pub fn is_denied(&self) -> bool {
        matches!(self, GateError::Denied { .. })
    }

    /// Denial reason, if any.
    pub fn reason(&self) -> Option<Reason> {
        match self {
            GateError::Denied { reason } => Some(*reason),
            _ => None,
        }
    }
}

/// Layer wrapping a service with [`DecisionEngine::evaluate`].
pub struct GuardLayer<T = NullSink> {
    engine: Arc<DecisionEngine<T>>,
}

impl<T> Clone for GuardLayer<T> {
    fn clone(&self) -> Self {
        Self { engine: self.engine.clone() }
    }
}

impl<T> std::fmt::Debug for GuardLayer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardLayer").field("engine", &self.engine).finish()
    }
}

impl<T> GuardLayer<T> {
    /// Create a layer sharing `engine`.
    pub fn new(engine: Arc<DecisionEngine<T>>) -> Self {
        Self { engine }
    }
}

impl<S, T> Layer<S> for GuardLayer<T> {
    type Service = GuardService<S, T>;

    fn layer(&self, inner: S) -> Self::Service {
        GuardService { inner, engine: self.engine.clone() }
    }
}

/// Service that evaluates each request before forwarding it.
pub struct GuardService<S, T = NullSink> {
    inner: S,
    engine: Arc<DecisionEngine<T>>,
}

impl<S: Clone, T> Clone for GuardService<S, T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), engine: self.engine.clone() }
    }
}

impl<S: std::fmt::Debug, T> std::fmt::Debug for GuardService<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardService").field("inner", &self.inner).finish()
    }
}

impl<S, T, Req> Service<Req> for GuardService<S, T>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    S::Response: Send + 'static,
    T: TelemetrySink,
    <T as tower::Service<GuardEvent>>::Future: Send + 'static,
    Req: LoginAttempt + Send + 'static,
{
    type Response = S::Response;
    type Error = GateError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(GateError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let engine = self.engine.clone();
        // the clone is not ready; keep the driven instance for this call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (login, password, address) = (req.login(), req.password(), req.address());
            let decision =
                engine.evaluate(login, password, address).await.map_err(GateError::Guard)?;
            if !decision.allowed {
                return Err(GateError::Denied { reason: decision.reason });
            }
            inner.call(req).await.map_err(GateError::Inner)
        })
    }
}
