use crate::category::{CategoryLimit, RateCategory};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// `RateLimit-Limit` response header.
pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
/// `RateLimit-Remaining` response header.
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
/// `RateLimit-Reset` response header.
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Where a client stands in its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub category: RateCategory,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the window rolls over.
    pub reset: Duration,
}

impl RateLimitInfo {
    /// Whole seconds until rollover, rounded up.
    pub fn reset_secs(&self) -> u64 {
        ceil_secs(self.reset)
    }

    /// Writes the `RateLimit-*` headers.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(self.reset_secs()));
    }
}

pub(crate) fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

#[derive(Debug)]
struct Window {
    started: Instant,
    length: Duration,
    count: u32,
}

impl Window {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.length
    }
}

/// Fixed-window counters keyed by category and client.
#[derive(Debug, Default)]
pub struct FixedWindowLimiter {
    windows: Mutex<HashMap<(RateCategory, String), Window>>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(RateCategory, String), Window>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts one request from `client`. `Err` means the window is used up;
    /// the request is not counted then.
    pub fn check(
        &self,
        category: RateCategory,
        client: &str,
        limit: CategoryLimit,
    ) -> Result<RateLimitInfo, RateLimitInfo> {
        let now = Instant::now();
        let mut windows = self.lock();
        let window = windows
            .entry((category, client.to_string()))
            .or_insert_with(|| Window {
                started: now,
                length: limit.window,
                count: 0,
            });

        if window.expired(now) {
            window.started = now;
            window.length = limit.window;
            window.count = 0;
        }

        let reset = window
            .length
            .saturating_sub(now.duration_since(window.started));

        if window.count >= limit.max {
            return Err(RateLimitInfo {
                category,
                limit: limit.max,
                remaining: 0,
                reset,
            });
        }

        window.count += 1;
        Ok(RateLimitInfo {
            category,
            limit: limit.max,
            remaining: limit.max - window.count,
            reset,
        })
    }

    /// Drops windows that have rolled over. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, window| !window.expired(now));
        before - windows.len()
    }

    /// Number of live windows.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
