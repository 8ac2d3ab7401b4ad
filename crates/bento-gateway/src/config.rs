//! Gateway configuration.
//!
//! Built-in defaults, then an optional TOML file, then environment
//! overrides for the listen address and service URLs. Every section is
//! optional in the file.
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [services]
//! POST = "http://posts.internal:3003"
//!
//! [rate_limit.general]
//! max = 300
//! window_secs = 60
//!
//! [resilience.bulkhead]
//! enabled = true
//! max_concurrent = 50
//! ```

use crate::routes::{default_routes, RouteConfig};
use bento_cache::{CacheError, CacheLayer, CacheRule};
use bento_ratelimiter::{RateCategory, RateLimiterLayer};
use bento_resilience::{BreakerOptions, BulkheadOptions, ResilienceOptions, RetryOptions};
use bento_router::Router;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Service ids, the environment variable overriding each URL, and the
/// default URL.
pub const SERVICES: [(&str, &str, &str); 8] = [
    ("AUTH", "AUTH_SERVICE_URL", "http://localhost:3001"),
    ("USER", "USER_SERVICE_URL", "http://localhost:3002"),
    ("POST", "POST_SERVICE_URL", "http://localhost:3003"),
    ("TOPIC", "TOPIC_SERVICE_URL", "http://localhost:3004"),
    ("COMMENT", "COMMENT_SERVICE_URL", "http://localhost:3005"),
    ("NOTIFICATION", "NOTIFICATION_SERVICE_URL", "http://localhost:3006"),
    ("UPLOAD", "UPLOAD_SERVICE_URL", "http://localhost:3007"),
    ("INTERACTION", "INTERACTION_SERVICE_URL", "http://localhost:3008"),
];

/// Errors raised while loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: String },

    #[error("route {path} points at unknown service {service}")]
    UnknownService { path: String, service: String },

    #[error("route {path} has invalid method {method:?}")]
    InvalidMethod { path: String, method: String },

    #[error("invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// The whole gateway configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    /// Service id to base URL.
    pub services: BTreeMap<String, String>,
    pub routes: Vec<RouteConfig>,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub resilience: ResilienceSettings,
    pub proxy: ProxySettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            services: SERVICES
                .iter()
                .map(|(id, _, url)| (id.to_string(), url.to_string()))
                .collect(),
            routes: default_routes(),
            cache: CacheSettings::default(),
            rate_limit: RateLimitSettings::default(),
            resilience: ResilienceSettings::default(),
            proxy: ProxySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// A cache rule as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheRuleConfig {
    /// Regular expression over the request path.
    pub pattern: String,
    pub ttl_secs: u64,
    #[serde(default)]
    pub vary_by_user: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub sweep_interval_secs: u64,
    /// Replaces the built-in rules when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<CacheRuleConfig>>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: 60,
            rules: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LimitSettings {
    pub max: u32,
    pub window_secs: u64,
}

impl From<RateCategory> for LimitSettings {
    fn from(category: RateCategory) -> Self {
        let limit = category.default_limit();
        Self {
            max: limit.max,
            window_secs: limit.window.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub sweep_interval_secs: u64,
    pub auth: LimitSettings,
    pub upload: LimitSettings,
    pub rpc: LimitSettings,
    pub general: LimitSettings,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: 60,
            auth: RateCategory::Auth.into(),
            upload: RateCategory::Upload.into(),
            rpc: RateCategory::Rpc.into(),
            general: RateCategory::General.into(),
        }
    }
}

impl RateLimitSettings {
    fn categories(&self) -> [(RateCategory, &LimitSettings); 4] {
        [
            (RateCategory::Auth, &self.auth),
            (RateCategory::Upload, &self.upload),
            (RateCategory::Rpc, &self.rpc),
            (RateCategory::General, &self.general),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    pub enabled: bool,
    pub retries: usize,
    pub factor: f64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryOptions::default();
        Self {
            enabled: true,
            retries: defaults.retries,
            factor: defaults.factor,
            min_delay_ms: defaults.min_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            jitter: defaults.jitter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub enabled: bool,
    pub error_threshold_percentage: f64,
    pub reset_timeout_ms: u64,
    pub volume_threshold: usize,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let defaults = BreakerOptions::default();
        Self {
            enabled: true,
            error_threshold_percentage: defaults.error_threshold_percentage,
            reset_timeout_ms: defaults.reset_timeout.as_millis() as u64,
            volume_threshold: defaults.volume_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BulkheadSettings {
    pub enabled: bool,
    pub max_concurrent: usize,
    pub max_queue: usize,
    pub queue_timeout_ms: u64,
}

impl Default for BulkheadSettings {
    fn default() -> Self {
        let defaults = BulkheadOptions::default();
        Self {
            enabled: false,
            max_concurrent: defaults.max_concurrent,
            max_queue: defaults.max_queue,
            queue_timeout_ms: defaults.queue_timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceSettings {
    /// Per-attempt timeout. Routes may override it.
    pub timeout_ms: u64,
    pub retry: RetrySettings,
    pub circuit_breaker: BreakerSettings,
    pub bulkhead: BulkheadSettings,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retry: RetrySettings::default(),
            circuit_breaker: BreakerSettings::default(),
            bulkhead: BulkheadSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Deadline for a whole request, retries included. A route timeout
    /// longer than this extends it for that route.
    pub timeout_ms: u64,
    /// Largest request body buffered for replay.
    pub body_limit_bytes: usize,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

impl GatewayConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses a TOML document. A partial `[services]` table is merged over
    /// the default URLs.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        for (id, _, url) in SERVICES {
            config
                .services
                .entry(id.to_string())
                .or_insert_with(|| url.to_string());
        }
        Ok(config)
    }

    /// Applies `PORT`, `HOST` and the `*_SERVICE_URL` variables found by
    /// `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        for (id, var, _) in SERVICES {
            if let Some(url) = lookup(var) {
                self.services.insert(id.to_string(), url);
            }
        }
        Ok(())
    }

    /// Rejects zero limits and windows, and routes to unknown services.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(value: u64, field: &str) -> Result<(), ConfigError> {
            if value == 0 {
                return Err(ConfigError::Zero {
                    field: field.to_string(),
                });
            }
            Ok(())
        }

        for (category, limit) in self.rate_limit.categories() {
            positive(limit.max.into(), &format!("rate_limit.{category}.max"))?;
            positive(limit.window_secs, &format!("rate_limit.{category}.window_secs"))?;
        }
        positive(self.rate_limit.sweep_interval_secs, "rate_limit.sweep_interval_secs")?;
        positive(self.cache.sweep_interval_secs, "cache.sweep_interval_secs")?;
        positive(self.resilience.timeout_ms, "resilience.timeout_ms")?;
        positive(self.proxy.timeout_ms, "proxy.timeout_ms")?;
        positive(self.proxy.body_limit_bytes as u64, "proxy.body_limit_bytes")?;
        if self.resilience.bulkhead.enabled {
            positive(
                self.resilience.bulkhead.max_concurrent as u64,
                "resilience.bulkhead.max_concurrent",
            )?;
        }

        for route in &self.routes {
            if !self.services.contains_key(&route.service) {
                return Err(ConfigError::UnknownService {
                    path: route.path.clone(),
                    service: route.service.clone(),
                });
            }
            if route.timeout_ms == Some(0) {
                return Err(ConfigError::Zero {
                    field: format!("routes[{}].timeout_ms", route.path),
                });
            }
            route.to_rule()?;
        }
        Ok(())
    }

    pub fn router(&self) -> Result<Router, ConfigError> {
        let rules = self
            .routes
            .iter()
            .map(RouteConfig::to_rule)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Router::new(rules))
    }

    pub fn service_urls(&self) -> HashMap<String, String> {
        self.services
            .iter()
            .map(|(id, url)| (id.clone(), url.clone()))
            .collect()
    }

    /// The response cache, or `None` when disabled.
    pub fn cache_layer(&self) -> Result<Option<CacheLayer>, ConfigError> {
        if !self.cache.enabled {
            return Ok(None);
        }
        let builder = CacheLayer::builder()
            .sweep_interval(Duration::from_secs(self.cache.sweep_interval_secs));
        let builder = match &self.cache.rules {
            None => builder.default_rules(),
            Some(rules) => {
                let rules = rules
                    .iter()
                    .map(|r| {
                        CacheRule::new(&r.pattern, Duration::from_secs(r.ttl_secs))
                            .map(|rule| rule.vary_by_user(r.vary_by_user))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                builder.rules(rules)
            }
        };
        Ok(Some(builder.build()))
    }

    /// The rate limiter, or `None` when disabled.
    pub fn rate_limiter(&self) -> Option<RateLimiterLayer> {
        if !self.rate_limit.enabled {
            return None;
        }
        let builder = self.rate_limit.categories().into_iter().fold(
            RateLimiterLayer::builder()
                .sweep_interval(Duration::from_secs(self.rate_limit.sweep_interval_secs)),
            |builder, (category, limit)| {
                builder.limit(category, limit.max, Duration::from_secs(limit.window_secs))
            },
        );
        Some(builder.build())
    }

    pub fn resilience_options(&self) -> ResilienceOptions {
        let settings = &self.resilience;
        let mut options =
            ResilienceOptions::none().with_timeout(Duration::from_millis(settings.timeout_ms));

        if settings.retry.enabled {
            options = options.with_retry(RetryOptions {
                retries: settings.retry.retries,
                factor: settings.retry.factor,
                min_delay: Duration::from_millis(settings.retry.min_delay_ms),
                max_delay: Duration::from_millis(settings.retry.max_delay_ms),
                jitter: settings.retry.jitter,
            });
        }
        if settings.circuit_breaker.enabled {
            options = options.with_circuit_breaker(BreakerOptions {
                error_threshold_percentage: settings.circuit_breaker.error_threshold_percentage,
                reset_timeout: Duration::from_millis(settings.circuit_breaker.reset_timeout_ms),
                volume_threshold: settings.circuit_breaker.volume_threshold,
            });
        }
        if settings.bulkhead.enabled {
            options = options.with_bulkhead(BulkheadOptions {
                max_concurrent: settings.bulkhead.max_concurrent,
                max_queue: settings.bulkhead.max_queue,
                queue_timeout: Duration::from_millis(settings.bulkhead.queue_timeout_ms),
            });
        }
        options
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.proxy.timeout_ms)
    }
}
