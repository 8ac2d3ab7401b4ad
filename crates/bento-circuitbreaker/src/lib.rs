//! Circuit breakers for downstream calls.
//!
//! A breaker watches the outcomes of calls to one named operation and stops
//! calling it while it is failing.
//!
//! ## States
//! - **Closed**: calls pass; outcomes are recorded in a rolling time window.
//!   When the window holds at least `volume_threshold` calls and the failure
//!   percentage reaches `error_threshold_percentage`, the circuit opens.
//! - **Open**: calls fail immediately with [`CircuitBreakerError::OpenCircuit`]
//!   without reaching the inner service, until `reset_timeout` elapses.
//! - **Half-Open**: exactly one trial call is admitted; concurrent callers are
//!   rejected. Success closes the circuit, failure reopens it.
//!
//! ## Usage
//!
//! ```rust
//! use bento_circuitbreaker::CircuitBreakerLayer;
//! use std::time::Duration;
//! use tower::{service_fn, ServiceBuilder};
//!
//! # #[derive(Debug)]
//! # struct Unreachable;
//! # impl From<bento_circuitbreaker::CircuitBreakerError> for Unreachable {
//! #     fn from(_: bento_circuitbreaker::CircuitBreakerError) -> Self { Unreachable }
//! # }
//! let breaker = CircuitBreakerLayer::builder()
//!     .name("topics-cb")
//!     .error_threshold_percentage(50.0)
//!     .volume_threshold(5)
//!     .reset_timeout(Duration::from_secs(30))
//!     .on_state_transition(|from, to| println!("topics-cb: {:?} -> {:?}", from, to))
//!     .build();
//!
//! let service = ServiceBuilder::new()
//!     .layer(breaker)
//!     .service(service_fn(|req: String| async move { Ok::<_, Unreachable>(req) }));
//! ```
//!
//! The inner service's error type must absorb [`CircuitBreakerError`]
//! (`S::Error: From<CircuitBreakerError>`); with
//! [`bento_resilience_core::ResilienceError`] this conversion is provided.
//!
//! ## Fallback
//!
//! [`CircuitBreaker::with_fallback`] answers rejected and failed calls from a
//! fallback function instead of returning the error.
//!
//! ## Feature Flags
//! - `metrics`: counters for calls, outcomes and transitions plus a state gauge
//! - `tracing`: logs transitions and rejections

use crate::circuit::{Admission, Circuit};
use crate::classifier::{CallOutcome, FailureClassifier};
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
use std::sync::atomic::AtomicU8;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::task::{Context, Poll};
use tower::Service;

pub use circuit::{CircuitState, CircuitStats};
pub use classifier::{DefaultClassifier, FnClassifier, KindClassifier};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::CircuitBreakerLayer;

mod circuit;
pub mod classifier;
mod config;
mod error;
mod events;
mod layer;

pub(crate) type FallbackFn<Req, Res, Err> =
    dyn Fn(Req) -> BoxFuture<'static, Result<Res, Err>> + Send + Sync;
pub(crate) type SharedFallback<Req, Res, Err> = Arc<FallbackFn<Req, Res, Err>>;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Calls permitted or rejected by the circuit breaker"
        );
        describe_counter!(
            "circuitbreaker_successes_total",
            "Calls recorded as successes"
        );
        describe_counter!(
            "circuitbreaker_failures_total",
            "Calls recorded as failures or timeouts"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Circuit breaker state transitions"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current state of the circuit breaker (0 closed, 1 open, 2 half-open)"
        );
    });
}

/// State shared by a layer, its clones and every service they produce.
pub(crate) struct Shared {
    pub(crate) config: CircuitBreakerConfig,
    pub(crate) circuit: Mutex<Circuit>,
    pub(crate) state: Arc<AtomicU8>,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission to call the inner service.
///
/// Dropping an unrecorded trial permit (caller went away mid-call) frees the
/// half-open slot so the next caller can probe.
struct Permit {
    shared: Arc<Shared>,
    trial: bool,
    recorded: bool,
}

impl Permit {
    fn acquire(shared: &Arc<Shared>) -> Option<Self> {
        let admission = shared.lock().try_acquire(&shared.config);
        match admission {
            Admission::Permitted { trial } => Some(Self {
                shared: Arc::clone(shared),
                trial,
                recorded: false,
            }),
            Admission::Rejected => {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %shared.config.name, "circuit open, call rejected");
                None
            }
        }
    }

    fn record(mut self, outcome: CallOutcome) {
        self.recorded = true;
        self.shared
            .lock()
            .record(outcome, self.trial, &self.shared.config);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.trial && !self.recorded {
            self.shared.lock().release_trial();
        }
    }
}

fn open_error(shared: &Shared) -> CircuitBreakerError {
    CircuitBreakerError::OpenCircuit {
        name: shared.config.name.clone(),
    }
}

/// A Tower Service that applies circuit breaker logic to an inner service.
///
/// - `S`: the inner service
/// - `C`: the failure classifier ([`DefaultClassifier`], [`KindClassifier`],
///   or [`FnClassifier`])
pub struct CircuitBreaker<S, C = DefaultClassifier> {
    inner: S,
    shared: Arc<Shared>,
    classifier: Arc<C>,
}

impl<S, C> CircuitBreaker<S, C> {
    pub(crate) fn new(inner: S, shared: Arc<Shared>, classifier: Arc<C>) -> Self {
        describe_metrics();
        Self {
            inner,
            shared,
            classifier,
        }
    }

    /// Answers rejected and failed calls from `fallback`.
    ///
    /// ```rust
    /// use bento_circuitbreaker::{CircuitBreakerError, CircuitBreakerLayer};
    /// use futures::future::BoxFuture;
    /// use tower::{service_fn, Service, ServiceExt};
    ///
    /// # async fn example() {
    /// let layer = CircuitBreakerLayer::builder().name("feed-cb").build();
    /// let svc = service_fn(|req: String| async move { Ok::<String, CircuitBreakerError>(req) });
    ///
    /// let mut service = layer.layer_fn(svc).with_fallback(
    ///     |_req: String| -> BoxFuture<'static, Result<String, CircuitBreakerError>> {
    ///         Box::pin(async { Ok("cached feed".to_string()) })
    ///     },
    /// );
    ///
    /// layer.force_open();
    /// let answer = service.ready().await.unwrap().call("feed".into()).await.unwrap();
    /// assert_eq!(answer, "cached feed");
    /// # }
    /// ```
    pub fn with_fallback<Req, Res, Err, F>(
        self,
        fallback: F,
    ) -> CircuitBreakerWithFallback<S, C, Req, Res, Err>
    where
        F: Fn(Req) -> BoxFuture<'static, Result<Res, Err>> + Send + Sync + 'static,
    {
        CircuitBreakerWithFallback {
            inner: self,
            fallback: Arc::new(fallback),
        }
    }

    /// The breaker's name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Current state without taking the lock.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.shared.state.load(std::sync::atomic::Ordering::Acquire))
    }

    /// True while the circuit is open.
    pub fn is_open(&self) -> bool {
        self.state_sync() == CircuitState::Open
    }

    /// Snapshot of the rolling window.
    pub fn stats(&self) -> CircuitStats {
        self.shared.lock().stats(&self.shared.config)
    }

    /// Opens the circuit until the reset timeout elapses.
    pub fn force_open(&self) {
        self.shared.lock().force_open(&self.shared.config);
    }

    /// Closes the circuit and clears the window.
    pub fn force_closed(&self) {
        self.shared.lock().force_closed(&self.shared.config);
    }

    /// Returns to Closed with an empty window.
    pub fn reset(&self) {
        self.shared.lock().reset();
    }
}

impl<S, C> Clone for CircuitBreaker<S, C>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            shared: Arc::clone(&self.shared),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<S, C, Req> Service<Req> for CircuitBreaker<S, C>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: From<CircuitBreakerError> + Send + 'static,
    C: FailureClassifier<S::Response, S::Error> + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let shared = Arc::clone(&self.shared);
        let classifier = Arc::clone(&self.classifier);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let Some(permit) = Permit::acquire(&shared) else {
                return Err(open_error(&shared).into());
            };

            let result = inner.call(req).await;
            permit.record(classifier.classify(&result));
            result
        })
    }
}

/// A circuit breaker that answers rejected and failed calls from a fallback.
///
/// Returned by [`CircuitBreaker::with_fallback`]. The request is cloned
/// before each call so the fallback can see it after a failure.
pub struct CircuitBreakerWithFallback<S, C, Req, Res, Err> {
    inner: CircuitBreaker<S, C>,
    fallback: SharedFallback<Req, Res, Err>,
}

impl<S, C, Req, Res, Err> CircuitBreakerWithFallback<S, C, Req, Res, Err> {
    /// The breaker's name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Current state without taking the lock.
    pub fn state_sync(&self) -> CircuitState {
        self.inner.state_sync()
    }

    /// Snapshot of the rolling window.
    pub fn stats(&self) -> CircuitStats {
        self.inner.stats()
    }
}

impl<S, C, Req, Res, Err> Clone for CircuitBreakerWithFallback<S, C, Req, Res, Err>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            fallback: Arc::clone(&self.fallback),
        }
    }
}

impl<S, C, Req, Res, Err> Service<Req> for CircuitBreakerWithFallback<S, C, Req, Res, Err>
where
    S: Service<Req, Response = Res, Error = Err> + Clone + Send + 'static,
    S::Future: Send + 'static,
    C: FailureClassifier<Res, Err> + 'static,
    Req: Clone + Send + 'static,
    Res: Send + 'static,
    Err: Send + 'static,
{
    type Response = Res;
    type Error = Err;
    type Future = BoxFuture<'static, Result<Res, Err>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let shared = Arc::clone(&self.inner.shared);
        let classifier = Arc::clone(&self.inner.classifier);
        let fallback = Arc::clone(&self.fallback);
        let clone = self.inner.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner.inner, clone);

        Box::pin(async move {
            let Some(permit) = Permit::acquire(&shared) else {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %shared.config.name, "circuit open, using fallback");
                return fallback(req).await;
            };

            let retained = req.clone();
            let result = inner.call(req).await;
            let outcome = classifier.classify(&result);
            permit.record(outcome);

            if result.is_err() && outcome.is_failure() {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %shared.config.name, "call failed, using fallback");
                return fallback(retained).await;
            }
            result
        })
    }
}
