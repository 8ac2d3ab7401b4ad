//! Routing from public gateway paths to downstream services.
//!
//! A [`Router`] holds [`RouteRule`]s in specificity order: the longest
//! pattern string is tried first, whatever order the rules were declared
//! in. The first rule whose segments match (and whose method filter, if
//! any, admits the method) wins.
//!
//! ```rust
//! use bento_router::{RouteRule, Router};
//! use http::Method;
//! use std::collections::HashMap;
//!
//! let router = Router::new([
//!     RouteRule::new("/v1/users", "USER"),
//!     RouteRule::new("/v1/users/:id", "USER"),
//!     RouteRule::new("/v1/users/:id/follow", "INTERACTION"),
//! ]);
//!
//! let services = HashMap::from([
//!     ("USER".to_string(), "http://users:3002".to_string()),
//!     ("INTERACTION".to_string(), "http://interactions:3008".to_string()),
//! ]);
//!
//! let route = router
//!     .resolve("/v1/users/42/follow", &Method::POST, &services)
//!     .unwrap();
//! assert_eq!(route.service, "INTERACTION");
//! assert_eq!(route.target_url, "http://interactions:3008/users/42/follow");
//! assert_eq!(route.params["id"], "42");
//! ```

mod error;
mod rule;

pub use error::RouteError;
pub use rule::{build_target_url, RouteRule};

use http::Method;
use std::collections::HashMap;
use std::time::Duration;

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Service id of the matched rule.
    pub service: String,
    /// Pattern of the matched rule.
    pub pattern: String,
    /// Full downstream URL, without query string.
    pub target_url: String,
    /// Captured path parameters.
    pub params: HashMap<String, String>,
    /// Per-route timeout override.
    pub timeout: Option<Duration>,
}

/// An ordered route table.
#[derive(Debug, Clone, Default)]
pub struct Router {
    rules: Vec<RouteRule>,
}

impl Router {
    /// Builds a router, ordering rules by descending pattern length.
    ///
    /// Rules of equal length keep their declaration order.
    pub fn new(rules: impl IntoIterator<Item = RouteRule>) -> Self {
        let mut rules: Vec<_> = rules.into_iter().collect();
        rules.sort_by(|a, b| b.pattern().len().cmp(&a.pattern().len()));
        Self { rules }
    }

    /// Rules in matching order.
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// The most specific rule matching `path` and `method`.
    pub fn find_route(&self, path: &str, method: &Method) -> Option<&RouteRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(path) && rule.allows(method))
    }

    /// Parameters `rule` captures from `path`.
    pub fn extract_params(&self, path: &str, rule: &RouteRule) -> HashMap<String, String> {
        rule.extract_params(path)
    }

    /// Matches `path`, looks the service up in `services` and builds the
    /// downstream URL.
    pub fn resolve(
        &self,
        path: &str,
        method: &Method,
        services: &HashMap<String, String>,
    ) -> Result<ResolvedRoute, RouteError> {
        let rule = self
            .find_route(path, method)
            .ok_or_else(|| RouteError::RouteNotFound {
                path: path.to_string(),
            })?;

        let service_url =
            services
                .get(rule.service())
                .ok_or_else(|| RouteError::ServiceNotConfigured {
                    service: rule.service().to_string(),
                })?;

        let params = rule.extract_params(path);
        let target_url = build_target_url(service_url, rule, &params, path);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            method = %method,
            path,
            pattern = rule.pattern(),
            target = %target_url,
            "resolved route"
        );

        Ok(ResolvedRoute {
            service: rule.service().to_string(),
            pattern: rule.pattern().to_string(),
            target_url,
            params,
            timeout: rule.timeout_override(),
        })
    }
}
