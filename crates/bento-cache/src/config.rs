//! Configuration for the response cache.

use crate::events::CacheEvent;
use crate::rules::{default_rules, CacheRule};
use crate::CacheLayer;
use bento_resilience_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for the response cache.
pub struct CacheConfig {
    pub(crate) rules: Vec<CacheRule>,
    pub(crate) sweep_interval: Duration,
    pub(crate) event_listeners: EventListeners<CacheEvent>,
    pub(crate) name: String,
}

impl CacheConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// The first rule that applies to a request, in declaration order.
    pub fn find_rule(&self, method: &http::Method, path: &str) -> Option<&CacheRule> {
        self.rules.iter().find(|rule| rule.applies(method, path))
    }

    pub fn rules(&self) -> &[CacheRule] {
        &self.rules
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for the response cache.
pub struct CacheConfigBuilder {
    rules: Vec<CacheRule>,
    sweep_interval: Duration,
    event_listeners: EventListeners<CacheEvent>,
    name: String,
}

impl CacheConfigBuilder {
    /// Creates a new builder with no rules.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            sweep_interval: Duration::from_secs(60),
            event_listeners: EventListeners::new(),
            name: String::from("response-cache"),
        }
    }

    /// Adds a rule. Rules are tried in the order they were added.
    pub fn rule(mut self, rule: CacheRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Adds several rules.
    pub fn rules(mut self, rules: impl IntoIterator<Item = CacheRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Adds the gateway's default rules.
    pub fn default_rules(self) -> Self {
        self.rules(default_rules())
    }

    /// Sets how often [`CacheLayer::spawn_sweeper`] reclaims stale entries.
    ///
    /// Default: 60 seconds
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the name used in events, logs and metrics.
    ///
    /// Default: `"response-cache"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback with the key of each hit.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CacheEvent::Hit { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Registers a callback with the key of each miss.
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CacheEvent::Miss { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Registers a callback with the fragment and removed count of each
    /// write invalidation.
    pub fn on_invalidate<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CacheEvent::Invalidated { fragment, removed, .. } = event {
                f(fragment, *removed);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build_config(self) -> CacheConfig {
        CacheConfig {
            rules: self.rules,
            sweep_interval: self.sweep_interval,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the layer.
    pub fn build(self) -> CacheLayer {
        CacheLayer::new(self.build_config())
    }
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
