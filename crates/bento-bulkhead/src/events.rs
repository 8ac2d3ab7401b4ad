//! Events emitted by the bulkhead.

use bento_resilience_core::{RejectReason, ResilienceEvent};
use std::time::{Duration, Instant};

/// Events emitted by the bulkhead.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call got a slot, directly or after waiting in the queue.
    CallPermitted {
        pattern_name: String,
        timestamp: Instant,
        /// Active calls including this one.
        concurrent_calls: usize,
    },
    /// A call joined the wait queue.
    CallQueued {
        pattern_name: String,
        timestamp: Instant,
        /// Queue length including this call.
        queue_len: usize,
    },
    /// A call was rejected.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
        reason: RejectReason,
    },
    /// A call finished successfully.
    CallFinished {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// A call finished with an error.
    CallFailed {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallQueued { .. } => "call_queued",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::CallFinished { .. } => "call_finished",
            BulkheadEvent::CallFailed { .. } => "call_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallQueued { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::CallFinished { timestamp, .. }
            | BulkheadEvent::CallFailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { pattern_name, .. }
            | BulkheadEvent::CallQueued { pattern_name, .. }
            | BulkheadEvent::CallRejected { pattern_name, .. }
            | BulkheadEvent::CallFinished { pattern_name, .. }
            | BulkheadEvent::CallFailed { pattern_name, .. } => pattern_name,
        }
    }
}
