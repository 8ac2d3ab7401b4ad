//! In-memory store of cached responses.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, StatusCode};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Response headers kept with a cached body.
pub(crate) const STORED_HEADERS: [HeaderName; 2] = [
    http::header::CONTENT_TYPE,
    HeaderName::from_static("x-request-id"),
];

/// Paths whose successful writes clear related entries.
pub(crate) const INVALIDATION_FRAGMENTS: [&str; 4] = ["/posts", "/topics", "/users", "/notifications"];

/// The path part of a `METHOD:path[:caller][:query]` key.
fn key_path(key: &str) -> &str {
    key.split(':').nth(1).unwrap_or(key)
}

/// A stored response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    stored_at: Instant,
    ttl: Duration,
}

impl CachedResponse {
    pub(crate) fn new(status: StatusCode, source: &HeaderMap, body: Bytes, ttl: Duration) -> Self {
        let mut headers = HeaderMap::new();
        for name in STORED_HEADERS.iter() {
            if let Some(value) = source.get(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        Self {
            status,
            headers,
            body,
            stored_at: Instant::now(),
            ttl,
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) > self.ttl
    }

    /// Time left before the entry goes stale.
    pub fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.stored_at.elapsed())
    }
}

/// Size and keys of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// Shared map from cache key to response.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CachedResponse>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedResponse>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A fresh entry for `key`. A stale entry is removed on the way.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_stale(Instant::now()) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    pub fn insert(&self, key: String, response: CachedResponse) {
        self.lock().insert(key, response);
    }

    /// Removes every entry whose path contains `fragment`. The caller and
    /// query parts of a key are not searched. Returns how many were removed.
    pub fn invalidate(&self, fragment: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !key_path(key).contains(fragment));
        before - entries.len()
    }

    /// Clears entries related to a successful write on `path`.
    ///
    /// Matching is by substring, so a write under `/v1/users` also clears
    /// `/v1/users-suggested`, and a comment written under a post clears
    /// every cached post. Returns the fragments that were applied and how
    /// many entries each removed.
    pub fn invalidate_for_write(&self, path: &str) -> Vec<(&'static str, usize)> {
        INVALIDATION_FRAGMENTS
            .iter()
            .filter(|fragment| path.contains(*fragment))
            .map(|fragment| (*fragment, self.invalidate(fragment)))
            .collect()
    }

    /// Drops stale entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_stale(now));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries and their keys, sorted.
    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        CacheStats {
            size: entries.len(),
            keys,
        }
    }
}
