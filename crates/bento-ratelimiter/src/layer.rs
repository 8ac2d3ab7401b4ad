use crate::category::RateCategory;
use crate::config::{RateLimiterConfig, RateLimiterConfigBuilder};
use crate::events::RateLimiterEvent;
use crate::limiter::{FixedWindowLimiter, RateLimitInfo};
use crate::{client_key, RateLimiter, RateLimiterError};
use http::Request;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tower::Layer;

/// A Tower [`Layer`] that rate limits HTTP requests per client.
///
/// Windows live in the layer, so every service it wraps shares them.
///
/// ```
/// use bento_ratelimiter::{RateCategory, RateLimiterLayer};
/// use std::time::Duration;
///
/// let limiter = RateLimiterLayer::builder()
///     .limit(RateCategory::General, 1000, Duration::from_secs(60))
///     .build();
/// assert_eq!(limiter.config().limit(RateCategory::General).max, 1000);
/// ```
#[derive(Clone)]
pub struct RateLimiterLayer {
    config: Arc<RateLimiterConfig>,
    limiter: Arc<FixedWindowLimiter>,
}

impl RateLimiterLayer {
    /// Creates a new `RateLimiterLayer` with the given configuration.
    pub fn new(config: RateLimiterConfig) -> Self {
        crate::describe_metrics();
        Self {
            config: Arc::new(config),
            limiter: Arc::new(FixedWindowLimiter::new()),
        }
    }

    /// Creates a new builder.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfig::builder()
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Counts `req` against its client's window.
    ///
    /// Returns `Ok(None)` for exempt paths, `Ok(Some(info))` when admitted.
    pub fn check<B>(&self, req: &Request<B>) -> Result<Option<RateLimitInfo>, RateLimiterError> {
        let path = req.uri().path();
        if self.config.is_exempt(path) {
            return Ok(None);
        }

        let category = RateCategory::for_path(path);
        let client = client_key(req);
        let limit = self.config.limit(category);

        match self.limiter.check(category, &client, limit) {
            Ok(info) => {
                self.config.event_listeners.emit(&RateLimiterEvent::Admitted {
                    pattern_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    category,
                    client,
                    remaining: info.remaining,
                });

                #[cfg(feature = "metrics")]
                metrics::counter!(
                    "ratelimiter_requests_total",
                    "limiter" => self.config.name.clone(),
                    "category" => category.as_str(),
                    "result" => "admitted"
                )
                .increment(1);

                Ok(Some(info))
            }
            Err(info) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    limiter = %self.config.name,
                    category = category.as_str(),
                    client = %client,
                    limit = info.limit,
                    retry_after_secs = info.reset_secs(),
                    "rate limit exceeded"
                );

                #[cfg(feature = "metrics")]
                metrics::counter!(
                    "ratelimiter_requests_total",
                    "limiter" => self.config.name.clone(),
                    "category" => category.as_str(),
                    "result" => "rejected"
                )
                .increment(1);

                self.config.event_listeners.emit(&RateLimiterEvent::Rejected {
                    pattern_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    category,
                    client,
                    retry_after: info.reset,
                });

                Err(RateLimiterError::LimitExceeded {
                    category,
                    limit: info.limit,
                    reset: info.reset,
                })
            }
        }
    }

    /// Drops windows that have rolled over. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let removed = self.limiter.sweep();
        if removed > 0 {
            self.config.event_listeners.emit(&RateLimiterEvent::Swept {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                removed,
            });

            #[cfg(feature = "tracing")]
            tracing::debug!(limiter = %self.config.name, removed, "pruned rate limit windows");
        }
        removed
    }

    /// Number of live windows.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Spawns a task that calls [`sweep`](Self::sweep) every
    /// `sweep_interval`. Must be called within a Tokio runtime.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let layer = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(layer.config.sweep_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                layer.sweep();
            }
        })
    }
}

impl std::fmt::Debug for RateLimiterLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterLayer")
            .field("name", &self.config.name)
            .field("tracked_clients", &self.limiter.len())
            .finish()
    }
}

impl<S> Layer<S> for RateLimiterLayer {
    type Service = RateLimiter<S>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimiter::new(service, self.clone())
    }
}
