//! Named breakers and bulkheads, and the composer that stacks them.

use crate::options::{BreakerOptions, BulkheadOptions, ResilienceOptions};
use bento_bulkhead::{BulkheadLayer, BulkheadStats};
use bento_circuitbreaker::{CircuitBreakerLayer, CircuitStats, KindClassifier};
use bento_resilience_core::{Classify, ResilienceError};
use bento_retry::RetryLayer;
use bento_timelimiter::TimeLimiterLayer;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower::util::BoxCloneService;
use tower::{Layer, Service, ServiceExt};

/// A composed call path.
pub type ResilientService<Req, T, E> = BoxCloneService<Req, T, ResilienceError<E>>;

/// Answers a call when the breaker is open or the call failed.
pub type Fallback<Req, T, E> =
    Arc<dyn Fn(Req) -> BoxFuture<'static, Result<T, ResilienceError<E>>> + Send + Sync>;

type Breaker = CircuitBreakerLayer<KindClassifier>;

/// Process-wide set of named circuit breakers and bulkheads.
///
/// Built once at startup and shared by `Arc`. A breaker is registered as
/// `"{name}-cb"` and a bulkhead as `"{name}-bh"` the first time a name is
/// used; the options given on that first use stick for the life of the
/// registry.
///
/// ```rust
/// use bento_resilience::{ResilienceOptions, ResilienceRegistry};
/// use bento_resilience_core::{Classify, FailureKind};
/// use tower::service_fn;
///
/// #[derive(Debug)]
/// struct Refused;
///
/// impl Classify for Refused {
///     fn failure_kind(&self) -> FailureKind {
///         FailureKind::Network
///     }
/// }
///
/// let registry = ResilienceRegistry::new();
/// let users = registry.compose(
///     "users",
///     &ResilienceOptions::default(),
///     service_fn(|id: u64| async move { Ok::<_, Refused>(id) }),
/// );
///
/// assert_eq!(registry.breaker_stats()[0].name, "users-cb");
/// ```
#[derive(Default)]
pub struct ResilienceRegistry {
    breakers: Mutex<HashMap<String, Breaker>>,
    bulkheads: Mutex<HashMap<String, BulkheadLayer>>,
}

impl ResilienceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The breaker for `name`, created with default options if missing.
    pub fn circuit_breaker(&self, name: &str) -> Breaker {
        self.circuit_breaker_with(name, &BreakerOptions::default())
    }

    /// The breaker for `name`, created with `options` if missing.
    pub fn circuit_breaker_with(&self, name: &str, options: &BreakerOptions) -> Breaker {
        let key = format!("{}-cb", name);
        let mut breakers = lock(&self.breakers);
        breakers
            .entry(key)
            .or_insert_with_key(|key| {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %key, "registering circuit breaker");

                CircuitBreakerLayer::builder()
                    .name(key.as_str())
                    .error_threshold_percentage(options.error_threshold_percentage)
                    .reset_timeout(options.reset_timeout)
                    .volume_threshold(options.volume_threshold)
                    .classify_errors()
                    .build()
            })
            .clone()
    }

    /// The bulkhead for `name`, created with default options if missing.
    pub fn bulkhead(&self, name: &str) -> BulkheadLayer {
        self.bulkhead_with(name, &BulkheadOptions::default())
    }

    /// The bulkhead for `name`, created with `options` if missing.
    pub fn bulkhead_with(&self, name: &str, options: &BulkheadOptions) -> BulkheadLayer {
        let key = format!("{}-bh", name);
        let mut bulkheads = lock(&self.bulkheads);
        bulkheads
            .entry(key)
            .or_insert_with_key(|key| {
                #[cfg(feature = "tracing")]
                tracing::debug!(bulkhead = %key, "registering bulkhead");

                BulkheadLayer::builder()
                    .name(key.as_str())
                    .max_concurrent_calls(options.max_concurrent)
                    .max_queue(options.max_queue)
                    .queue_timeout(options.queue_timeout)
                    .build()
            })
            .clone()
    }

    /// Stats of every registered breaker, sorted by name.
    pub fn breaker_stats(&self) -> Vec<CircuitStats> {
        let mut stats: Vec<_> = lock(&self.breakers).values().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Stats of every registered bulkhead, sorted by name.
    pub fn bulkhead_stats(&self) -> Vec<BulkheadStats> {
        let mut stats: Vec<_> = lock(&self.bulkheads).values().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Rejects every queued call in every bulkhead.
    pub fn shutdown(&self) {
        for bulkhead in lock(&self.bulkheads).values() {
            bulkhead.shutdown();
        }

        #[cfg(feature = "tracing")]
        tracing::info!("resilience registry shut down");
    }

    /// Wraps `service` as bulkhead → circuit breaker → deadline → retry →
    /// timeout.
    ///
    /// Layers missing from `options` are skipped. The timeout applies to
    /// each attempt, so a retried call can take up to
    /// `(retries + 1) × timeout` plus backoff unless a deadline cuts it
    /// short. An expired deadline reaches the breaker as a timeout. Retry
    /// gives up at once on anything but network errors, timeouts, 5xx and
    /// 429; the breaker does not count client errors as failures.
    pub fn compose<S, Req, T, E>(
        &self,
        name: &str,
        options: &ResilienceOptions,
        service: S,
    ) -> ResilientService<Req, T, E>
    where
        S: Service<Req, Response = T, Error = E> + Clone + Send + 'static,
        S::Future: Send + 'static,
        Req: Clone + Send + 'static,
        T: Send + 'static,
        E: Classify + Send + Sync + 'static,
    {
        self.build(name, options, service, None)
    }

    /// Like [`compose`](Self::compose), with `fallback` answering calls the
    /// breaker rejects or that fail.
    ///
    /// A breaker is always installed, with default options when `options`
    /// has none.
    pub fn compose_with_fallback<S, Req, T, E>(
        &self,
        name: &str,
        options: &ResilienceOptions,
        service: S,
        fallback: Fallback<Req, T, E>,
    ) -> ResilientService<Req, T, E>
    where
        S: Service<Req, Response = T, Error = E> + Clone + Send + 'static,
        S::Future: Send + 'static,
        Req: Clone + Send + 'static,
        T: Send + 'static,
        E: Classify + Send + Sync + 'static,
    {
        self.build(name, options, service, Some(fallback))
    }

    fn build<S, Req, T, E>(
        &self,
        name: &str,
        options: &ResilienceOptions,
        service: S,
        fallback: Option<Fallback<Req, T, E>>,
    ) -> ResilientService<Req, T, E>
    where
        S: Service<Req, Response = T, Error = E> + Clone + Send + 'static,
        S::Future: Send + 'static,
        Req: Clone + Send + 'static,
        T: Send + 'static,
        E: Classify + Send + Sync + 'static,
    {
        let application: fn(E) -> ResilienceError<E> = ResilienceError::Application;
        let mut svc = BoxCloneService::new(service.map_err(application));

        if let Some(timeout) = options.timeout {
            let layer = TimeLimiterLayer::builder()
                .timeout_duration(timeout)
                .name(name)
                .build();
            svc = BoxCloneService::new(layer.layer(svc));
        }

        if let Some(retry) = &options.retry {
            let layer = RetryLayer::<ResilienceError<E>>::builder()
                .retries(retry.retries)
                .factor(retry.factor)
                .min_delay(retry.min_delay)
                .max_delay(retry.max_delay)
                .jitter(retry.jitter)
                .name(name)
                .retry_transient_errors()
                .build();
            svc = BoxCloneService::new(layer.layer(svc));
        }

        if let Some(deadline) = options.deadline {
            let layer = TimeLimiterLayer::builder()
                .timeout_duration(deadline)
                .cancel_running_future(true)
                .name(format!("{}-deadline", name))
                .build();
            svc = BoxCloneService::new(layer.layer(svc));
        }

        let breaker = match (&options.circuit_breaker, &fallback) {
            (Some(breaker), _) => Some(breaker.clone()),
            (None, Some(_)) => Some(BreakerOptions::default()),
            (None, None) => None,
        };
        if let Some(breaker) = breaker {
            let layer = self.circuit_breaker_with(name, &breaker);
            svc = match fallback {
                Some(fallback) => BoxCloneService::new(
                    layer
                        .layer_fn(svc)
                        .with_fallback(move |req: Req| fallback(req)),
                ),
                None => BoxCloneService::new(layer.layer(svc)),
            };
        }

        if let Some(bulkhead) = &options.bulkhead {
            let layer = self.bulkhead_with(name, bulkhead);
            svc = BoxCloneService::new(layer.layer(svc));
        }

        svc
    }
}

impl std::fmt::Debug for ResilienceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceRegistry")
            .field("breakers", &lock(&self.breakers).keys().collect::<Vec<_>>())
            .field("bulkheads", &lock(&self.bulkheads).keys().collect::<Vec<_>>())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
