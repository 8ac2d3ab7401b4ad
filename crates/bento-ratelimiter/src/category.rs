//! Request categories and their limits.

use std::fmt;
use std::time::Duration;

/// The bucket a request is counted in, picked from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RateCategory {
    /// Sign-in and registration.
    Auth,
    /// File uploads.
    Upload,
    /// Service-to-service lookups.
    Rpc,
    /// Everything else.
    General,
}

impl RateCategory {
    pub const ALL: [RateCategory; 4] = [
        RateCategory::Auth,
        RateCategory::Upload,
        RateCategory::Rpc,
        RateCategory::General,
    ];

    /// Picks the category for `path`. The first match wins, in the order
    /// auth, upload, rpc, general.
    ///
    /// ```rust
    /// use bento_ratelimiter::RateCategory;
    ///
    /// assert_eq!(RateCategory::for_path("/v1/authenticate"), RateCategory::Auth);
    /// assert_eq!(RateCategory::for_path("/v1/upload-file"), RateCategory::Upload);
    /// assert_eq!(RateCategory::for_path("/v1/rpc/users/by-ids"), RateCategory::Rpc);
    /// assert_eq!(RateCategory::for_path("/v1/posts"), RateCategory::General);
    /// ```
    pub fn for_path(path: &str) -> Self {
        if path.contains("/authenticate") || path.contains("/register") {
            RateCategory::Auth
        } else if path.contains("/upload") {
            RateCategory::Upload
        } else if path.contains("/rpc/") {
            RateCategory::Rpc
        } else {
            RateCategory::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RateCategory::Auth => "auth",
            RateCategory::Upload => "upload",
            RateCategory::Rpc => "rpc",
            RateCategory::General => "general",
        }
    }

    /// Message sent to a rejected client.
    pub fn message(&self) -> &'static str {
        match self {
            RateCategory::Auth => "Too many authentication attempts, please try again later.",
            RateCategory::Upload => "Too many uploads, please try again later.",
            RateCategory::Rpc | RateCategory::General => {
                "Too many requests, please try again later."
            }
        }
    }

    /// 20 per 15 minutes for auth, 10 per minute for uploads, 500 per
    /// minute for rpc and 100 per minute otherwise.
    pub fn default_limit(&self) -> CategoryLimit {
        match self {
            RateCategory::Auth => CategoryLimit::new(20, Duration::from_secs(15 * 60)),
            RateCategory::Upload => CategoryLimit::new(10, Duration::from_secs(60)),
            RateCategory::Rpc => CategoryLimit::new(500, Duration::from_secs(60)),
            RateCategory::General => CategoryLimit::new(100, Duration::from_secs(60)),
        }
    }
}

impl fmt::Display for RateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// At most `max` requests per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryLimit {
    pub max: u32,
    pub window: Duration,
}

impl CategoryLimit {
    pub const fn new(max: u32, window: Duration) -> Self {
        Self { max, window }
    }
}
