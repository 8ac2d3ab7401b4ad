//! Error types for bulkhead pattern.

use bento_resilience_core::{RejectReason, ResilienceError};
use std::time::Duration;

/// Errors that can occur when using a bulkhead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkheadError {
    /// Every slot is busy and the bulkhead has no wait queue.
    #[error("bulkhead {name} is full: max concurrent calls ({max_concurrent_calls}) reached")]
    BulkheadFull {
        /// Bulkhead name.
        name: String,
        /// Maximum concurrent calls allowed.
        max_concurrent_calls: usize,
    },
    /// Every slot is busy and the wait queue is at capacity.
    #[error("bulkhead {name} is full: queue limit ({max_queue}) reached")]
    QueueFull {
        /// Bulkhead name.
        name: String,
        /// Maximum queued calls allowed.
        max_queue: usize,
    },
    /// The call waited in the queue longer than the queue timeout.
    #[error("bulkhead {name}: queue timeout after {waited:?}")]
    QueueTimeout {
        /// Bulkhead name.
        name: String,
        /// Configured queue timeout.
        waited: Duration,
    },
    /// The bulkhead was shut down while the call was queued.
    #[error("bulkhead {name} is shutting down")]
    Shutdown {
        /// Bulkhead name.
        name: String,
    },
}

impl BulkheadError {
    /// Why the call was turned away.
    pub fn reason(&self) -> RejectReason {
        match self {
            BulkheadError::BulkheadFull { .. } | BulkheadError::QueueFull { .. } => {
                RejectReason::QueueFull
            }
            BulkheadError::QueueTimeout { .. } => RejectReason::QueueTimeout,
            BulkheadError::Shutdown { .. } => RejectReason::Shutdown,
        }
    }
}

/// Result type for bulkhead operations.
pub type Result<T> = std::result::Result<T, BulkheadError>;

impl<E> From<BulkheadError> for ResilienceError<E> {
    fn from(err: BulkheadError) -> Self {
        let reason = err.reason();
        match err {
            BulkheadError::BulkheadFull {
                max_concurrent_calls,
                ..
            } => ResilienceError::BulkheadFull {
                concurrent_calls: max_concurrent_calls,
                max_concurrent: max_concurrent_calls,
            },
            BulkheadError::QueueFull { name, .. }
            | BulkheadError::QueueTimeout { name, .. }
            | BulkheadError::Shutdown { name } => {
                ResilienceError::BulkheadRejected { name, reason }
            }
        }
    }
}
