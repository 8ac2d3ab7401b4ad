use crate::backoff::{ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, IntervalFunction};
use crate::events::RetryEvent;
use crate::policy::{RetryPolicy, RetryPredicate};
use crate::RetryLayer;
use bento_resilience_core::events::{EventListeners, FnListener};
use bento_resilience_core::Classify;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the retry middleware.
pub struct RetryConfig<E> {
    pub(crate) policy: RetryPolicy<E>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

impl<E> RetryConfig<E> {
    /// Creates a new builder.
    pub fn builder() -> RetryConfigBuilder<E> {
        RetryConfigBuilder::new()
    }

    /// Wraps this configuration in a layer.
    pub fn layer(self) -> RetryLayer<E> {
        RetryLayer::new(self)
    }

    /// The retry policy.
    pub fn policy(&self) -> &RetryPolicy<E> {
        &self.policy
    }
}

/// Builder for [`RetryConfig`].
///
/// Unless [`backoff`](Self::backoff) or [`fixed_backoff`](Self::fixed_backoff)
/// replaces it, the delay before retry `n` is
/// `min(max_delay, min_delay × factor^(n-1))`, multiplied by a random factor
/// in `[1, 2)` when jitter is on and clamped to `max_delay` again.
pub struct RetryConfigBuilder<E> {
    max_attempts: usize,
    factor: f64,
    min_delay: Duration,
    max_delay: Duration,
    jitter: bool,
    interval_fn: Option<Arc<dyn IntervalFunction>>,
    retry_predicate: Option<RetryPredicate<E>>,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl<E> Default for RetryConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> RetryConfigBuilder<E> {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - retries: 3 (4 attempts in total)
    /// - factor: 2
    /// - min_delay: 1s, max_delay: 10s
    /// - jitter: on
    /// - every error is retried
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            max_attempts: 4,
            factor: 2.0,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: true,
            interval_fn: None,
            retry_predicate: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets how many times a failed call is repeated (first call excluded).
    pub fn retries(mut self, retries: usize) -> Self {
        self.max_attempts = retries.saturating_add(1);
        self
    }

    /// Sets the total number of calls, first call included.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the backoff growth factor.
    pub fn factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Sets the delay before the first retry.
    pub fn min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    /// Caps every delay, jitter included.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Turns the random `[1, 2)` delay multiplier on or off.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Uses the same delay before every retry.
    pub fn fixed_backoff(mut self, duration: Duration) -> Self {
        self.interval_fn = Some(Arc::new(FixedInterval::new(duration)));
        self
    }

    /// Replaces the exponential schedule with a custom interval function.
    pub fn backoff<I>(mut self, interval_fn: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval_fn = Some(Arc::new(interval_fn));
        self
    }

    /// Retries only errors for which `predicate` returns true.
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Stops retrying as soon as `predicate` returns true for an error.
    pub fn bail_if<F>(self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
        E: 'static,
    {
        self.retry_on(move |e| !predicate(e))
    }

    /// Sets the name for this retry instance (used in events and logs).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback before each retry with the 1-based retry number
    /// and the delay.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback on success with the number of attempts used.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when every attempt failed.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Error { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when the bail rule stopped the loop.
    pub fn on_bail<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Bailed { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build_config(self) -> RetryConfig<E> {
        let interval_fn: Arc<dyn IntervalFunction> = match self.interval_fn {
            Some(interval_fn) => interval_fn,
            None if self.jitter => Arc::new(
                ExponentialRandomBackoff::new(self.min_delay)
                    .multiplier(self.factor)
                    .max_interval(self.max_delay),
            ),
            None => Arc::new(
                ExponentialBackoff::new(self.min_delay)
                    .multiplier(self.factor)
                    .max_interval(self.max_delay),
            ),
        };

        let mut policy = RetryPolicy::new(self.max_attempts, interval_fn);
        policy.retry_predicate = self.retry_predicate;

        RetryConfig {
            policy,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the layer.
    pub fn build(self) -> RetryLayer<E> {
        RetryLayer::new(self.build_config())
    }
}

impl<E> RetryConfigBuilder<E>
where
    E: Classify + 'static,
{
    /// Bails on client errors (4xx except 429) and retries everything else.
    pub fn bail_on_client_errors(self) -> Self {
        self.bail_if(|e: &E| e.failure_kind().is_client_error())
    }

    /// Retries only network errors, timeouts, 5xx and 429; bails on
    /// everything else.
    pub fn retry_transient_errors(self) -> Self {
        self.retry_on(|e: &E| e.failure_kind().is_retryable())
    }
}
