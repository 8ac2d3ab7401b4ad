//! Circuit breaker behavior through the public layer API.
//!
//! Test organization:
//! - thresholds.rs: failure rate and volume threshold precision
//! - classification.rs: which errors count toward the failure rate
//! - half_open.rs: trial calls after the reset timeout
//! - manual.rs: forced transitions, reset and fallbacks

mod classification;
mod half_open;
mod thresholds;

use bento_resilience_core::{Classify, FailureKind, ResilienceError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::BoxCloneService;

/// A downstream answer with a non-success status.
#[derive(Debug, Clone, PartialEq)]
pub struct Upstream(pub u16);

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upstream answered {}", self.0)
    }
}

impl std::error::Error for Upstream {}

impl Classify for Upstream {
    fn failure_kind(&self) -> FailureKind {
        FailureKind::Status(self.0)
    }
}

pub type CallError = ResilienceError<Upstream>;

/// A service answering from `script` by call index; `None` is a success.
/// Calls past the end of the script succeed. Returns the call counter.
pub fn scripted(
    script: Vec<Option<u16>>,
) -> (BoxCloneService<(), (), CallError>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let service = tower::service_fn(move |_req: ()| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let answer = script.get(n).copied().flatten();
        async move {
            match answer {
                Some(status) => Err(ResilienceError::Application(Upstream(status))),
                None => Ok(()),
            }
        }
    });
    (BoxCloneService::new(service), calls)
}
