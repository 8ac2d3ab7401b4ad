//! Retry behavior through the public layer API.
//!
//! Test organization:
//! - integration.rs: attempt counting, bail rules, exhaustion
//! - backoff.rs: delays between attempts

mod backoff;

use bento_resilience_core::{Classify, FailureKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::BoxCloneService;

#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Refused,
    Status(u16),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Refused => write!(f, "connection refused"),
            Failure::Status(code) => write!(f, "HTTP {}", code),
        }
    }
}

impl std::error::Error for Failure {}

impl Classify for Failure {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Failure::Refused => FailureKind::Network,
            Failure::Status(code) => FailureKind::Status(*code),
        }
    }
}

/// Fails with `failure` for the first `failures` calls, then answers with
/// the attempt number.
pub fn failing(
    failures: usize,
    failure: Failure,
) -> (BoxCloneService<&'static str, usize, Failure>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let service = tower::service_fn(move |_req: &'static str| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let failure = failure.clone();
        async move {
            if n <= failures {
                Err(failure)
            } else {
                Ok(n)
            }
        }
    });
    (BoxCloneService::new(service), calls)
}
