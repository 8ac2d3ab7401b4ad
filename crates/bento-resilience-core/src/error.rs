//! Unified error type for composed resilience stacks.
//!
//! Each pattern crate converts its own error into [`ResilienceError`], so a
//! service wrapped in bulkhead, breaker, retry and timeout layers only ever
//! deals with one error type:
//!
//! ```rust
//! use bento_resilience_core::ResilienceError;
//!
//! #[derive(Debug, Clone)]
//! struct Unreachable;
//!
//! impl std::fmt::Display for Unreachable {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "connection refused")
//!     }
//! }
//!
//! impl std::error::Error for Unreachable {}
//!
//! type ForwardError = ResilienceError<Unreachable>;
//!
//! let err: ForwardError = ResilienceError::Timeout { layer: "time_limiter" };
//! assert!(err.is_timeout());
//! ```

use crate::classify::{Classify, FailureKind};
use std::fmt;
use std::time::Duration;

/// Why a bulkhead turned a call away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Every slot and every queue position was taken.
    QueueFull,
    /// The call waited in the queue longer than the queue timeout.
    QueueTimeout,
    /// The bulkhead was shut down while the call was queued.
    Shutdown,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::QueueFull => write!(f, "queue is full"),
            RejectReason::QueueTimeout => write!(f, "queue timeout"),
            RejectReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Error produced by a stack of resilience layers around a service whose own
/// error type is `E`.
#[derive(Debug, Clone)]
pub enum ResilienceError<E> {
    /// A deadline elapsed before the call completed.
    Timeout {
        /// Layer that gave up (`"time_limiter"`, `"bulkhead"`).
        layer: &'static str,
    },

    /// The circuit breaker is open and rejected the call.
    CircuitOpen {
        /// Breaker name, when configured.
        name: Option<String>,
    },

    /// The bulkhead has no free slot.
    BulkheadFull {
        /// Calls in flight when the call was rejected.
        concurrent_calls: usize,
        /// Configured concurrency limit.
        max_concurrent: usize,
    },

    /// The bulkhead rejected a queued or queueable call.
    BulkheadRejected {
        /// Bulkhead name.
        name: String,
        /// Why the call was rejected.
        reason: RejectReason,
    },

    /// A rate limiter rejected the call.
    RateLimited {
        /// How long until the window resets, if known.
        retry_after: Option<Duration>,
    },

    /// The wrapped service failed.
    Application(E),
}

impl<E> fmt::Display for ResilienceError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResilienceError::Timeout { layer } => write!(f, "timeout in {}", layer),
            ResilienceError::CircuitOpen { name: Some(n) } => {
                write!(f, "circuit breaker '{}' is open", n)
            }
            ResilienceError::CircuitOpen { name: None } => write!(f, "circuit breaker is open"),
            ResilienceError::BulkheadFull {
                concurrent_calls,
                max_concurrent,
            } => write!(f, "bulkhead full ({}/{})", concurrent_calls, max_concurrent),
            ResilienceError::BulkheadRejected { name, reason } => {
                write!(f, "bulkhead {} rejected call: {}", name, reason)
            }
            ResilienceError::RateLimited {
                retry_after: Some(d),
            } => write!(f, "rate limited, retry after {:?}", d),
            ResilienceError::RateLimited { retry_after: None } => write!(f, "rate limited"),
            ResilienceError::Application(e) => write!(f, "{}", e),
        }
    }
}

impl<E> std::error::Error for ResilienceError<E> where E: std::error::Error {}

impl<E> ResilienceError<E> {
    /// True for deadline errors from any layer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::Timeout { .. })
    }

    /// True when an open breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    /// True for every kind of bulkhead rejection.
    pub fn is_bulkhead_rejected(&self) -> bool {
        matches!(
            self,
            ResilienceError::BulkheadFull { .. } | ResilienceError::BulkheadRejected { .. }
        )
    }

    /// True when a rate limiter rejected the call.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ResilienceError::RateLimited { .. })
    }

    /// True when the wrapped service itself failed.
    pub fn is_application(&self) -> bool {
        matches!(self, ResilienceError::Application(_))
    }

    /// Borrows the wrapped service's error.
    pub fn as_application(&self) -> Option<&E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            _ => None,
        }
    }

    /// Takes the wrapped service's error.
    pub fn application_error(self) -> Option<E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the application error, leaving layer errors untouched.
    ///
    /// ```
    /// use bento_resilience_core::ResilienceError;
    ///
    /// let err: ResilienceError<String> = ResilienceError::Application("refused".into());
    /// assert_eq!(err.map_application(|s| s.len()).application_error(), Some(7));
    /// ```
    pub fn map_application<F, T>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::Timeout { layer } => ResilienceError::Timeout { layer },
            ResilienceError::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            ResilienceError::BulkheadFull {
                concurrent_calls,
                max_concurrent,
            } => ResilienceError::BulkheadFull {
                concurrent_calls,
                max_concurrent,
            },
            ResilienceError::BulkheadRejected { name, reason } => {
                ResilienceError::BulkheadRejected { name, reason }
            }
            ResilienceError::RateLimited { retry_after } => {
                ResilienceError::RateLimited { retry_after }
            }
            ResilienceError::Application(e) => ResilienceError::Application(f(e)),
        }
    }
}

impl<E: Classify> Classify for ResilienceError<E> {
    fn failure_kind(&self) -> FailureKind {
        match self {
            ResilienceError::Timeout { .. } => FailureKind::Timeout,
            ResilienceError::RateLimited { .. } => FailureKind::Status(429),
            ResilienceError::Application(e) => e.failure_kind(),
            ResilienceError::CircuitOpen { .. }
            | ResilienceError::BulkheadFull { .. }
            | ResilienceError::BulkheadRejected { .. } => FailureKind::Other,
        }
    }
}
