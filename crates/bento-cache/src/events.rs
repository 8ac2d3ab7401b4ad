//! Event types for the response cache.

use bento_resilience_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by the response cache.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A fresh entry answered the request.
    Hit {
        pattern_name: String,
        timestamp: Instant,
        key: String,
    },
    /// No fresh entry; the request was forwarded.
    Miss {
        pattern_name: String,
        timestamp: Instant,
        key: String,
    },
    /// A successful write removed related entries.
    Invalidated {
        pattern_name: String,
        timestamp: Instant,
        fragment: String,
        removed: usize,
    },
    /// The sweeper reclaimed expired entries.
    Swept {
        pattern_name: String,
        timestamp: Instant,
        removed: usize,
    },
}

impl ResilienceEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Invalidated { .. } => "invalidated",
            CacheEvent::Swept { .. } => "swept",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Invalidated { timestamp, .. }
            | CacheEvent::Swept { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CacheEvent::Hit { pattern_name, .. }
            | CacheEvent::Miss { pattern_name, .. }
            | CacheEvent::Invalidated { pattern_name, .. }
            | CacheEvent::Swept { pattern_name, .. } => pattern_name,
        }
    }
}
