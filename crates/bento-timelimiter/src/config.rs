//! Configuration for the time limiter.

use crate::events::TimeLimiterEvent;
use crate::TimeLimiterLayer;
use bento_resilience_core::{EventListeners, FnListener};
use std::time::Duration;

/// Default budgets by kind of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub fast: Duration,
    pub standard: Duration,
    pub database: Duration,
    pub external: Duration,
    pub upload: Duration,
    pub long: Duration,
}

/// The gateway's timeout table.
pub const TIMEOUTS: Timeouts = Timeouts {
    fast: Duration::from_secs(1),
    standard: Duration::from_secs(5),
    database: Duration::from_secs(10),
    external: Duration::from_secs(30),
    upload: Duration::from_secs(60),
    long: Duration::from_secs(120),
};

/// Configuration for the time limiter.
pub struct TimeLimiterConfig {
    pub(crate) timeout_duration: Duration,
    pub(crate) cancel_running_future: bool,
    pub(crate) event_listeners: EventListeners<TimeLimiterEvent>,
    pub(crate) name: String,
}

impl TimeLimiterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> TimeLimiterConfigBuilder {
        TimeLimiterConfigBuilder::new()
    }

    /// The budget for each call.
    pub fn timeout_duration(&self) -> Duration {
        self.timeout_duration
    }

    /// Whether timed-out calls are dropped.
    pub fn cancel_running_future(&self) -> bool {
        self.cancel_running_future
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`TimeLimiterConfig`].
pub struct TimeLimiterConfigBuilder {
    timeout_duration: Duration,
    cancel_running_future: bool,
    event_listeners: EventListeners<TimeLimiterEvent>,
    name: String,
}

impl TimeLimiterConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            timeout_duration: TIMEOUTS.standard,
            cancel_running_future: false,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the budget for each call.
    ///
    /// Default: 5 seconds (`TIMEOUTS.standard`)
    pub fn timeout_duration(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Drops the call when the budget elapses instead of leaving it running.
    ///
    /// When false the call is spawned onto the runtime and keeps running in
    /// the background after a timeout; its result is discarded.
    ///
    /// Default: false
    pub fn cancel_running_future(mut self, cancel: bool) -> Self {
        self.cancel_running_future = cancel;
        self
    }

    /// Sets the name of this instance for events and logs.
    ///
    /// Default: `"<unnamed>"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for calls that succeed within the budget.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TimeLimiterEvent::Success { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback for calls that fail within the budget.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TimeLimiterEvent::Error { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback for timeouts.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, TimeLimiterEvent::Timeout { .. }) {
                f();
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build_config(self) -> TimeLimiterConfig {
        TimeLimiterConfig {
            timeout_duration: self.timeout_duration,
            cancel_running_future: self.cancel_running_future,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the layer.
    pub fn build(self) -> TimeLimiterLayer {
        TimeLimiterLayer::new(self.build_config())
    }
}

impl Default for TimeLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
