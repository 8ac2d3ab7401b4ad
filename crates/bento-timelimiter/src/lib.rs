//! Timeout guard for Tower services.
//!
//! Races each call against a timer. When the budget elapses first the call
//! fails with [`TimeLimiterError::Timeout`], converted into the wrapped
//! service's error type.
//!
//! By default the call is *not* cancelled: it is spawned onto the Tokio
//! runtime and may still finish in the background, its result discarded.
//! Set [`cancel_running_future`](TimeLimiterConfigBuilder::cancel_running_future)
//! to drop it instead.
//!
//! ```rust
//! use bento_resilience_core::ResilienceError;
//! use bento_timelimiter::{TimeLimiterLayer, TIMEOUTS};
//! use tower::{Layer, ServiceExt, service_fn};
//!
//! # async fn example() {
//! let layer = TimeLimiterLayer::builder()
//!     .timeout_duration(TIMEOUTS.fast)
//!     .name("feed")
//!     .on_timeout(|| eprintln!("feed call timed out"))
//!     .build();
//!
//! let svc = layer.layer(service_fn(|req: String| async move {
//!     Ok::<_, ResilienceError<std::io::Error>>(req)
//! }));
//!
//! let response = svc.oneshot("timeline".to_string()).await;
//! # }
//! ```
//!
//! | Budget | Duration |
//! |--------|----------|
//! | `TIMEOUTS.fast` | 1s |
//! | `TIMEOUTS.standard` | 5s |
//! | `TIMEOUTS.database` | 10s |
//! | `TIMEOUTS.external` | 30s |
//! | `TIMEOUTS.upload` | 60s |
//! | `TIMEOUTS.long` | 120s |

use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

pub use config::{TimeLimiterConfig, TimeLimiterConfigBuilder, Timeouts, TIMEOUTS};
pub use error::TimeLimiterError;
pub use events::TimeLimiterEvent;
pub use layer::TimeLimiterLayer;

mod config;
mod error;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "timelimiter_calls_total",
            "Total number of time limiter calls (success, error, or timeout)"
        );
        describe_histogram!(
            "timelimiter_call_duration_seconds",
            "Duration of calls that finished within the budget"
        );
    });
}

/// A Tower service that puts a time budget on an inner service.
#[derive(Clone)]
pub struct TimeLimiter<S> {
    inner: S,
    config: Arc<TimeLimiterConfig>,
}

impl<S> TimeLimiter<S> {
    pub(crate) fn new(inner: S, config: Arc<TimeLimiterConfig>) -> Self {
        Self { inner, config }
    }
}

impl<S, Req> Service<Req> for TimeLimiter<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: From<TimeLimiterError> + Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let config = Arc::clone(&self.config);
        let budget = config.timeout_duration;
        let call = inner.call(req);

        Box::pin(async move {
            let start = Instant::now();

            let outcome = if config.cancel_running_future {
                tokio::time::timeout(budget, call).await.ok()
            } else {
                // The spawned call outlives a timeout; dropping the handle detaches it.
                match tokio::time::timeout(budget, tokio::spawn(call)).await {
                    Ok(Ok(result)) => Some(result),
                    Ok(Err(join_error)) if join_error.is_panic() => {
                        std::panic::resume_unwind(join_error.into_panic())
                    }
                    Ok(Err(_)) | Err(_) => None,
                }
            };

            match outcome {
                Some(Ok(response)) => {
                    let duration = start.elapsed();
                    config.event_listeners.emit(&TimeLimiterEvent::Success {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        duration,
                    });

                    #[cfg(feature = "metrics")]
                    {
                        counter!("timelimiter_calls_total", "timelimiter" => config.name.clone(), "result" => "success").increment(1);
                        histogram!("timelimiter_call_duration_seconds", "timelimiter" => config.name.clone())
                            .record(duration.as_secs_f64());
                    }

                    Ok(response)
                }
                Some(Err(err)) => {
                    let duration = start.elapsed();
                    config.event_listeners.emit(&TimeLimiterEvent::Error {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        duration,
                    });

                    #[cfg(feature = "metrics")]
                    {
                        counter!("timelimiter_calls_total", "timelimiter" => config.name.clone(), "result" => "error").increment(1);
                        histogram!("timelimiter_call_duration_seconds", "timelimiter" => config.name.clone())
                            .record(duration.as_secs_f64());
                    }

                    #[cfg(feature = "tracing")]
                    debug!(
                        timelimiter = %config.name,
                        duration_ms = duration.as_millis(),
                        "call failed within budget"
                    );

                    Err(err)
                }
                None => {
                    config.event_listeners.emit(&TimeLimiterEvent::Timeout {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        timeout_duration: budget,
                        cancelled: config.cancel_running_future,
                    });

                    #[cfg(feature = "metrics")]
                    counter!("timelimiter_calls_total", "timelimiter" => config.name.clone(), "result" => "timeout").increment(1);

                    #[cfg(feature = "tracing")]
                    warn!(
                        timelimiter = %config.name,
                        timeout_ms = budget.as_millis(),
                        cancelled = config.cancel_running_future,
                        "call timed out"
                    );

                    Err(TimeLimiterError::Timeout {
                        name: config.name.clone(),
                        timeout: budget,
                    }
                    .into())
                }
            }
        })
    }
}
