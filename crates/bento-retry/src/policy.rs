use crate::backoff::IntervalFunction;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether an error should be retried.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// How many times to call, how long to wait in between, and which errors
/// end the loop early.
pub struct RetryPolicy<E> {
    pub(crate) max_attempts: usize,
    pub(crate) interval_fn: Arc<dyn IntervalFunction>,
    pub(crate) retry_predicate: Option<RetryPredicate<E>>,
}

impl<E> RetryPolicy<E> {
    /// Creates a policy that retries every error.
    ///
    /// `max_attempts` includes the first call and is at least 1.
    pub fn new(max_attempts: usize, interval_fn: Arc<dyn IntervalFunction>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval_fn,
            retry_predicate: None,
        }
    }

    /// Only errors for which `predicate` returns true are retried.
    pub fn with_retry_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Total calls allowed, first call included.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// True unless the predicate says to bail.
    pub fn should_retry(&self, error: &E) -> bool {
        match &self.retry_predicate {
            Some(predicate) => predicate(error),
            None => true,
        }
    }

    /// Delay before retry `attempt + 1`.
    pub fn next_backoff(&self, attempt: usize) -> Duration {
        self.interval_fn.next_interval(attempt)
    }
}
