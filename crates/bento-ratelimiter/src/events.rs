//! Event types for the rate limiter.

use crate::category::RateCategory;
use bento_resilience_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by the rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A request was counted and let through.
    Admitted {
        pattern_name: String,
        timestamp: Instant,
        category: RateCategory,
        client: String,
        remaining: u32,
    },
    /// A request arrived after its client used up the window.
    Rejected {
        pattern_name: String,
        timestamp: Instant,
        category: RateCategory,
        client: String,
        retry_after: Duration,
    },
    /// Expired windows were pruned.
    Swept {
        pattern_name: String,
        timestamp: Instant,
        removed: usize,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::Admitted { .. } => "admitted",
            RateLimiterEvent::Rejected { .. } => "rejected",
            RateLimiterEvent::Swept { .. } => "swept",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::Admitted { timestamp, .. }
            | RateLimiterEvent::Rejected { timestamp, .. }
            | RateLimiterEvent::Swept { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RateLimiterEvent::Admitted { pattern_name, .. }
            | RateLimiterEvent::Rejected { pattern_name, .. }
            | RateLimiterEvent::Swept { pattern_name, .. } => pattern_name,
        }
    }
}
