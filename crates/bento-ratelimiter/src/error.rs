use crate::category::RateCategory;
use bento_resilience_core::ResilienceError;
use std::time::Duration;

/// Errors returned by the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimiterError {
    /// The client used up its window for this category.
    #[error("{}", .category.message())]
    LimitExceeded {
        category: RateCategory,
        limit: u32,
        /// Time until the window rolls over.
        reset: Duration,
    },
}

impl RateLimiterError {
    /// How long the client should wait before trying again.
    pub fn retry_after(&self) -> Duration {
        match self {
            RateLimiterError::LimitExceeded { reset, .. } => *reset,
        }
    }

    pub fn category(&self) -> RateCategory {
        match self {
            RateLimiterError::LimitExceeded { category, .. } => *category,
        }
    }
}

impl<E> From<RateLimiterError> for ResilienceError<E> {
    fn from(err: RateLimiterError) -> Self {
        ResilienceError::RateLimited {
            retry_after: Some(err.retry_after()),
        }
    }
}
