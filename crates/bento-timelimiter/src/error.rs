//! Error types for the time limiter.

use bento_resilience_core::ResilienceError;
use std::time::Duration;

/// Errors produced by the time limiter itself.
///
/// Errors from the wrapped service pass through unchanged; the service's
/// error type must implement `From<TimeLimiterError>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeLimiterError {
    /// The call did not complete within the budget.
    #[error("'{name}' timed out after {timeout:?}")]
    Timeout {
        /// Time limiter name.
        name: String,
        /// Budget that elapsed.
        timeout: Duration,
    },
}

impl TimeLimiterError {
    /// Returns true if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeLimiterError::Timeout { .. })
    }

    /// The budget that elapsed.
    pub fn timeout(&self) -> Duration {
        match self {
            TimeLimiterError::Timeout { timeout, .. } => *timeout,
        }
    }
}

impl<E> From<TimeLimiterError> for ResilienceError<E> {
    fn from(_: TimeLimiterError) -> Self {
        ResilienceError::Timeout {
            layer: "time_limiter",
        }
    }
}
