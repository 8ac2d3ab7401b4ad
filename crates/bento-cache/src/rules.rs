//! Which requests are cached, for how long, and how keys are built.

use crate::error::CacheError;
use http::Method;
use regex::Regex;
use std::time::Duration;

/// A cacheable path.
///
/// ```rust
/// use bento_cache::CacheRule;
/// use std::time::Duration;
///
/// let rule = CacheRule::new(r"^/v1/notifications$", Duration::from_secs(10))
///     .unwrap()
///     .vary_by_user(true);
///
/// assert!(rule.applies(&http::Method::GET, "/v1/notifications"));
/// assert!(!rule.applies(&http::Method::POST, "/v1/notifications"));
/// ```
#[derive(Debug, Clone)]
pub struct CacheRule {
    pattern: Regex,
    ttl: Duration,
    methods: Vec<Method>,
    vary_by_user: bool,
}

impl CacheRule {
    /// A GET-only rule shared between callers.
    pub fn new(pattern: &str, ttl: Duration) -> Result<Self, CacheError> {
        let pattern = Regex::new(pattern).map_err(|source| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern,
            ttl,
            methods: vec![Method::GET],
            vary_by_user: false,
        })
    }

    /// Sets the methods this rule caches.
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Keeps a separate entry per caller.
    pub fn vary_by_user(mut self, vary: bool) -> Self {
        self.vary_by_user = vary;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn varies_by_user(&self) -> bool {
        self.vary_by_user
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// True when `path` matches and `method` is cached.
    pub fn applies(&self, method: &Method, path: &str) -> bool {
        self.methods.contains(method) && self.pattern.is_match(path)
    }
}

/// Topics 5 min, suggested users 60 s per caller, a user 30 s, the post
/// list 15 s, a post 30 s, notifications 10 s per caller.
pub fn default_rules() -> Vec<CacheRule> {
    const TABLE: &[(&str, u64, bool)] = &[
        (r"^/v1/topics$", 300, false),
        (r"^/v1/topics/[^/]+$", 300, false),
        (r"^/v1/users-suggested$", 60, true),
        (r"^/v1/users/[^/]+$", 30, false),
        (r"^/v1/posts$", 15, false),
        (r"^/v1/posts/[^/]+$", 30, false),
        (r"^/v1/notifications$", 10, true),
    ];

    TABLE
        .iter()
        .filter_map(|(pattern, secs, vary)| {
            CacheRule::new(pattern, Duration::from_secs(*secs))
                .ok()
                .map(|rule| rule.vary_by_user(*vary))
        })
        .collect()
}

/// Builds the cache key for a request.
///
/// `METHOD:path`, then `:caller` when the rule varies by user (`anonymous`
/// without a caller), then `:query` with its pairs sorted.
pub fn cache_key(
    method: &Method,
    path: &str,
    query: Option<&str>,
    caller: Option<&str>,
    vary_by_user: bool,
) -> String {
    let mut key = format!("{}:{}", method, path);

    if vary_by_user {
        key.push(':');
        key.push_str(caller.unwrap_or("anonymous"));
    }

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
        pairs.sort_unstable();
        if !pairs.is_empty() {
            key.push(':');
            key.push_str(&pairs.join("&"));
        }
    }

    key
}
