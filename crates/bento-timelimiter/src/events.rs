//! Event types for the time limiter.

use bento_resilience_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by the time limiter.
#[derive(Debug, Clone)]
pub enum TimeLimiterEvent {
    /// The call finished successfully within the budget.
    Success {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// The call failed within the budget.
    Error {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// The budget elapsed first.
    Timeout {
        pattern_name: String,
        timestamp: Instant,
        timeout_duration: Duration,
        /// Whether the call was dropped rather than left running.
        cancelled: bool,
    },
}

impl ResilienceEvent for TimeLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TimeLimiterEvent::Success { .. } => "success",
            TimeLimiterEvent::Error { .. } => "error",
            TimeLimiterEvent::Timeout { .. } => "timeout",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TimeLimiterEvent::Success { timestamp, .. }
            | TimeLimiterEvent::Error { timestamp, .. }
            | TimeLimiterEvent::Timeout { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            TimeLimiterEvent::Success { pattern_name, .. }
            | TimeLimiterEvent::Error { pattern_name, .. }
            | TimeLimiterEvent::Timeout { pattern_name, .. } => pattern_name,
        }
    }
}
