//! Tower layer for the time limiter.

use crate::config::{TimeLimiterConfig, TimeLimiterConfigBuilder};
use crate::TimeLimiter;
use std::sync::Arc;
use std::time::Duration;
use tower::layer::Layer;

/// A Tower layer that puts a time budget on every call.
#[derive(Clone)]
pub struct TimeLimiterLayer {
    config: Arc<TimeLimiterConfig>,
}

impl TimeLimiterLayer {
    pub(crate) fn new(config: TimeLimiterConfig) -> Self {
        crate::describe_metrics();
        Self {
            config: Arc::new(config),
        }
    }

    /// Creates a new builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use bento_timelimiter::{TimeLimiterLayer, TIMEOUTS};
    ///
    /// let layer = TimeLimiterLayer::builder()
    ///     .timeout_duration(TIMEOUTS.external)
    ///     .name("media-upload")
    ///     .build();
    /// ```
    pub fn builder() -> TimeLimiterConfigBuilder {
        TimeLimiterConfig::builder()
    }

    /// A layer with the given budget and default settings otherwise.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::builder().timeout_duration(timeout).build()
    }

    /// The configuration.
    pub fn config(&self) -> &TimeLimiterConfig {
        &self.config
    }
}

impl std::fmt::Debug for TimeLimiterLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeLimiterLayer")
            .field("name", &self.config.name)
            .field("timeout", &self.config.timeout_duration)
            .field("cancel_running_future", &self.config.cancel_running_future)
            .finish()
    }
}

impl From<TimeLimiterConfig> for TimeLimiterLayer {
    fn from(config: TimeLimiterConfig) -> Self {
        Self::new(config)
    }
}

impl<S> Layer<S> for TimeLimiterLayer {
    type Service = TimeLimiter<S>;

    fn layer(&self, service: S) -> Self::Service {
        TimeLimiter::new(service, Arc::clone(&self.config))
    }
}
