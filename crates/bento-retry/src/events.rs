use bento_resilience_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by the retry middleware.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A retry is about to be made after `delay`.
    Retry {
        pattern_name: String,
        timestamp: Instant,
        /// 1-based number of the retry.
        attempt: usize,
        delay: Duration,
    },
    /// A call succeeded, on the first try or after retries.
    Success {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// Every attempt failed; the last error is returned.
    Error {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// The bail predicate stopped the loop; the error is returned as is.
    Bailed {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "Retry",
            RetryEvent::Success { .. } => "Success",
            RetryEvent::Error { .. } => "Error",
            RetryEvent::Bailed { .. } => "Bailed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Error { timestamp, .. }
            | RetryEvent::Bailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RetryEvent::Retry { pattern_name, .. }
            | RetryEvent::Success { pattern_name, .. }
            | RetryEvent::Error { pattern_name, .. }
            | RetryEvent::Bailed { pattern_name, .. } => pattern_name,
        }
    }
}
