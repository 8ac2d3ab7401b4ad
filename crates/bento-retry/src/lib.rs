//! Retry middleware for Tower services.
//!
//! A failed call is repeated up to `retries` more times. The delay before
//! retry `n` is `min(max_delay, min_delay × factor^(n-1))`, optionally
//! multiplied by a random factor in `[1, 2)` and clamped to `max_delay`.
//! A bail rule ends the loop early; otherwise the last error is returned
//! unchanged once attempts run out.
//!
//! # Examples
//!
//! ```
//! use bento_retry::RetryConfig;
//! use bento_resilience_core::{Classify, FailureKind};
//! use std::time::Duration;
//! use tower::ServiceBuilder;
//!
//! #[derive(Debug, Clone)]
//! struct Upstream(u16);
//!
//! impl Classify for Upstream {
//!     fn failure_kind(&self) -> FailureKind {
//!         FailureKind::Status(self.0)
//!     }
//! }
//!
//! let retry = RetryConfig::<Upstream>::builder()
//!     .retries(3)
//!     .factor(2.0)
//!     .min_delay(Duration::from_secs(1))
//!     .max_delay(Duration::from_secs(10))
//!     .bail_on_client_errors()
//!     .on_retry(|attempt, delay| println!("retry {} in {:?}", attempt, delay))
//!     .build();
//!
//! let service = ServiceBuilder::new()
//!     .layer(retry)
//!     .service(tower::service_fn(|req: String| async move { Ok::<_, Upstream>(req) }));
//! ```
//!
//! Requests must be `Clone`; each attempt gets its own copy.

mod backoff;
mod config;
mod events;
mod layer;
mod policy;

pub use backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;
pub use layer::RetryLayer;
pub use policy::{RetryPolicy, RetryPredicate};

use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!("retry_calls_total", "Calls through retry, by outcome");
        describe_counter!("retry_attempts_total", "Retries performed");
    });
}

/// A Tower [`Service`] that retries failed requests.
pub struct Retry<S, E> {
    inner: S,
    config: Arc<RetryConfig<E>>,
}

impl<S, E> Retry<S, E> {
    /// Creates a new `Retry` service wrapping the given service.
    pub fn new(inner: S, config: Arc<RetryConfig<E>>) -> Self {
        describe_metrics();
        Self { inner, config }
    }
}

impl<S, E> Clone for Retry<S, E>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, Req, E> Service<Req> for Retry<S, E>
where
    S: Service<Req, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    E: Send + 'static,
    S::Response: Send + 'static,
{
    type Response = S::Response;
    type Error = E;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let clone = self.inner.clone();
        let mut service = std::mem::replace(&mut self.inner, clone);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let mut attempts = 0;

            loop {
                attempts += 1;
                let error = match service.call(req.clone()).await {
                    Ok(response) => {
                        config.event_listeners.emit(&RetryEvent::Success {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempts,
                        });

                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "success").increment(1);

                        return Ok(response);
                    }
                    Err(error) => error,
                };

                if !config.policy.should_retry(&error) {
                    config.event_listeners.emit(&RetryEvent::Bailed {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        attempts,
                    });

                    #[cfg(feature = "tracing")]
                    tracing::debug!(retry = %config.name, attempts, "error is not retryable, giving up");

                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "bailed").increment(1);

                    return Err(error);
                }

                if attempts >= config.policy.max_attempts {
                    config.event_listeners.emit(&RetryEvent::Error {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        attempts,
                    });

                    #[cfg(feature = "tracing")]
                    tracing::warn!(retry = %config.name, attempts, "retries exhausted");

                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "exhausted").increment(1);

                    return Err(error);
                }

                let delay = config.policy.next_backoff(attempts - 1);
                config.event_listeners.emit(&RetryEvent::Retry {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                    attempt: attempts,
                    delay,
                });

                #[cfg(feature = "tracing")]
                tracing::debug!(retry = %config.name, attempt = attempts, ?delay, "retrying");

                #[cfg(feature = "metrics")]
                counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);

                drop(error);
                tokio::time::sleep(delay).await;
            }
        })
    }
}
