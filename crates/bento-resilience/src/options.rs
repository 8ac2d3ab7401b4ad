//! Options for one composed call path.

use std::time::Duration;

/// Retry settings for a composition.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOptions {
    /// Repeats after the first call.
    pub retries: usize,
    /// Backoff growth factor.
    pub factor: f64,
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Cap on every delay.
    pub max_delay: Duration,
    /// Random `[1, 2)` multiplier on each delay.
    pub jitter: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            factor: 2.0,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

/// Circuit breaker settings, applied the first time a name is seen.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerOptions {
    /// Failure rate (percent) that opens the circuit.
    pub error_threshold_percentage: f64,
    /// How long the circuit stays open before a trial call.
    pub reset_timeout: Duration,
    /// Calls needed in the window before the rate is evaluated.
    pub volume_threshold: usize,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            error_threshold_percentage: 50.0,
            reset_timeout: Duration::from_secs(30),
            volume_threshold: 5,
        }
    }
}

/// Bulkhead settings, applied the first time a name is seen.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkheadOptions {
    pub max_concurrent: usize,
    pub max_queue: usize,
    pub queue_timeout: Duration,
}

impl Default for BulkheadOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_queue: 100,
            queue_timeout: Duration::from_secs(30),
        }
    }
}

/// Which layers wrap a call and how they are tuned.
///
/// Each layer is optional; `None` leaves it out of the stack.
///
/// Defaults:
/// - timeout: 10s
/// - retry: 3 retries, ×2, 1s..10s, jitter
/// - circuit breaker: 50%, 30s reset, volume 5
/// - bulkhead: disabled
/// - deadline: none
#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceOptions {
    pub timeout: Option<Duration>,
    /// Budget for a whole call, retries and backoff included. Enforced
    /// inside the breaker, so an expired deadline counts as a timeout.
    pub deadline: Option<Duration>,
    pub retry: Option<RetryOptions>,
    pub circuit_breaker: Option<BreakerOptions>,
    pub bulkhead: Option<BulkheadOptions>,
}

impl Default for ResilienceOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(10)),
            deadline: None,
            retry: Some(RetryOptions::default()),
            circuit_breaker: Some(BreakerOptions::default()),
            bulkhead: None,
        }
    }
}

impl ResilienceOptions {
    /// Options with every layer disabled.
    pub fn none() -> Self {
        Self {
            timeout: None,
            deadline: None,
            retry: None,
            circuit_breaker: None,
            bulkhead: None,
        }
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the budget for the whole call.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets retry options.
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sets circuit breaker options.
    pub fn with_circuit_breaker(mut self, breaker: BreakerOptions) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Enables the bulkhead.
    pub fn with_bulkhead(mut self, bulkhead: BulkheadOptions) -> Self {
        self.bulkhead = Some(bulkhead);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    pub fn without_circuit_breaker(mut self) -> Self {
        self.circuit_breaker = None;
        self
    }
}
