//! The public route table.

use crate::config::ConfigError;
use bento_router::RouteRule;
use http::Method;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One entry of the route table, as written in the config file.
///
/// ```toml
/// [[routes]]
/// path = "/v1/upload-file"
/// service = "UPLOAD"
/// timeout_ms = 60000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Public path pattern, `:name` segments capture.
    pub path: String,
    /// Service id, a key of the `[services]` table.
    pub service: String,
    /// Target path template. Defaults to `path` without `/v1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<String>,
    /// Per-attempt timeout for this route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Methods the route answers. All when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<String>>,
}

impl RouteConfig {
    pub fn new(path: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            service: service.into(),
            rewrite: None,
            timeout_ms: None,
            methods: None,
        }
    }

    pub fn rewrite(mut self, template: impl Into<String>) -> Self {
        self.rewrite = Some(template.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Compiles the entry into a router rule.
    pub fn to_rule(&self) -> Result<RouteRule, ConfigError> {
        let mut rule = RouteRule::new(self.path.as_str(), self.service.as_str());
        if let Some(rewrite) = &self.rewrite {
            rule = rule.rewrite(rewrite.as_str());
        }
        if let Some(ms) = self.timeout_ms {
            rule = rule.timeout(Duration::from_millis(ms));
        }
        if let Some(methods) = &self.methods {
            let methods = methods
                .iter()
                .map(|m| {
                    Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|_| {
                        ConfigError::InvalidMethod {
                            path: self.path.clone(),
                            method: m.clone(),
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rule = rule.methods(methods);
        }
        Ok(rule)
    }
}

/// Every public route the gateway serves.
///
/// Order does not matter: the router always tries the longest pattern first.
pub fn default_routes() -> Vec<RouteConfig> {
    const TABLE: &[(&str, &str)] = &[
        // auth
        ("/v1/register", "AUTH"),
        ("/v1/authenticate", "AUTH"),
        ("/v1/profile", "AUTH"),
        ("/v1/rpc/introspect", "AUTH"),
        // users
        ("/v1/rpc/users/by-ids", "USER"),
        ("/v1/rpc/users/find", "USER"),
        ("/v1/rpc/users", "USER"),
        ("/v1/users/:id", "USER"),
        ("/v1/users", "USER"),
        // follows and saves
        ("/v1/users/:id/saved-posts", "INTERACTION"),
        ("/v1/users/:id/follow", "INTERACTION"),
        ("/v1/users/:id/unfollow", "INTERACTION"),
        ("/v1/users/:id/has-followed", "INTERACTION"),
        ("/v1/users/:id/followers", "INTERACTION"),
        ("/v1/users/:id/followings", "INTERACTION"),
        ("/v1/posts/:id/like", "INTERACTION"),
        ("/v1/posts/:id/unlike", "INTERACTION"),
        ("/v1/posts/:id/save", "INTERACTION"),
        ("/v1/posts/:id/unsave", "INTERACTION"),
        ("/v1/posts/:id/liked-users", "INTERACTION"),
        ("/v1/rpc/has-liked", "INTERACTION"),
        ("/v1/rpc/list-post-ids-liked", "INTERACTION"),
        ("/v1/rpc/has-saved", "INTERACTION"),
        ("/v1/rpc/list-post-ids-saved", "INTERACTION"),
        // posts
        ("/v1/posts/rpc", "POST"),
        ("/v1/posts/:id", "POST"),
        ("/v1/posts", "POST"),
        // topics
        ("/v1/rpc/topics", "TOPIC"),
        ("/v1/topics/:id", "TOPIC"),
        ("/v1/topics", "TOPIC"),
        // comments
        ("/v1/posts/:postId/comments", "COMMENT"),
        ("/v1/comments/:id/replies", "COMMENT"),
        ("/v1/comments/:id", "COMMENT"),
        ("/v1/comments", "COMMENT"),
        // notifications
        ("/v1/notifications/:id/read", "NOTIFICATION"),
        ("/v1/notifications/read-all", "NOTIFICATION"),
        ("/v1/notifications", "NOTIFICATION"),
        // uploads
        ("/v1/uploads", "UPLOAD"),
    ];

    let mut routes: Vec<RouteConfig> = TABLE
        .iter()
        .map(|(path, service)| RouteConfig::new(*path, *service))
        .collect();

    routes.push(RouteConfig::new("/v1/users-suggested", "USER").rewrite("/users/suggested"));
    routes.push(RouteConfig::new("/v1/upload-file", "UPLOAD").timeout(Duration::from_secs(60)));
    routes
}
