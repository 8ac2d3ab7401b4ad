use crate::category::{CategoryLimit, RateCategory};
use crate::events::RateLimiterEvent;
use crate::RateLimiterLayer;
use bento_resilience_core::{EventListeners, FnListener};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the rate limiter.
pub struct RateLimiterConfig {
    pub(crate) limits: HashMap<RateCategory, CategoryLimit>,
    pub(crate) exempt_paths: Vec<String>,
    pub(crate) exempt_prefixes: Vec<String>,
    pub(crate) sweep_interval: Duration,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) name: String,
}

impl RateLimiterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// The limit applied to `category`.
    pub fn limit(&self, category: RateCategory) -> CategoryLimit {
        self.limits
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_limit())
    }

    /// True when requests to `path` are never counted.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|p| p == path)
            || self.exempt_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    limits: HashMap<RateCategory, CategoryLimit>,
    exempt_paths: Vec<String>,
    exempt_prefixes: Vec<String>,
    sweep_interval: Duration,
    event_listeners: EventListeners<RateLimiterEvent>,
    name: String,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - limits: [`RateCategory::default_limit`] for each category
    /// - exempt: `/health`, `/api/health` and everything under `/health/`
    /// - sweep_interval: 60 seconds
    /// - name: `"rate-limiter"`
    pub fn new() -> Self {
        Self {
            limits: RateCategory::ALL
                .iter()
                .map(|c| (*c, c.default_limit()))
                .collect(),
            exempt_paths: vec!["/health".to_string(), "/api/health".to_string()],
            exempt_prefixes: vec!["/health/".to_string()],
            sweep_interval: Duration::from_secs(60),
            event_listeners: EventListeners::new(),
            name: "rate-limiter".to_string(),
        }
    }

    /// Sets the limit for one category.
    pub fn limit(mut self, category: RateCategory, max: u32, window: Duration) -> Self {
        self.limits
            .insert(category, CategoryLimit::new(max, window));
        self
    }

    /// Never counts requests to exactly `path`.
    pub fn exempt(mut self, path: impl Into<String>) -> Self {
        self.exempt_paths.push(path.into());
        self
    }

    /// Never counts requests whose path starts with `prefix`.
    pub fn exempt_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.exempt_prefixes.push(prefix.into());
        self
    }

    /// Sets how often [`RateLimiterLayer::spawn_sweeper`] prunes windows.
    ///
    /// Default: 60 seconds
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the name for this limiter (used in events, logs and metrics).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a request is admitted.
    ///
    /// Called with the category and the requests left in the window.
    pub fn on_admitted<F>(mut self, f: F) -> Self
    where
        F: Fn(RateCategory, u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::Admitted {
                category,
                remaining,
                ..
            } = event
            {
                f(*category, *remaining);
            }
        }));
        self
    }

    /// Registers a callback when a request is rejected.
    ///
    /// Called with the category and the client key.
    ///
    /// ```rust
    /// use bento_ratelimiter::RateLimiterLayer;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let rejected = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&rejected);
    ///
    /// let limiter = RateLimiterLayer::builder()
    ///     .on_rejected(move |category, client| {
    ///         counter.fetch_add(1, Ordering::SeqCst);
    ///         eprintln!("{client} hit the {category} limit");
    ///     })
    ///     .build();
    /// ```
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(RateCategory, &str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::Rejected {
                category, client, ..
            } = event
            {
                f(*category, client);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build_config(self) -> RateLimiterConfig {
        RateLimiterConfig {
            limits: self.limits,
            exempt_paths: self.exempt_paths,
            exempt_prefixes: self.exempt_prefixes,
            sweep_interval: self.sweep_interval,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the layer.
    pub fn build(self) -> RateLimiterLayer {
        RateLimiterLayer::new(self.build_config())
    }
}
