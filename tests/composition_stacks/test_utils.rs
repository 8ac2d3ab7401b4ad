//! Common test utilities for composition stack tests.

use bento_resilience_core::{Classify, FailureKind};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::Service;

/// What a mock upstream answers with.
#[derive(Debug, Clone, PartialEq)]
pub enum Upstream {
    Refused,
    Status(u16),
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upstream::Refused => f.write_str("connection refused"),
            Upstream::Status(code) => write!(f, "HTTP {}", code),
        }
    }
}

impl std::error::Error for Upstream {}

impl Classify for Upstream {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Upstream::Refused => FailureKind::Network,
            Upstream::Status(code) => FailureKind::Status(*code),
        }
    }
}

/// Creates a mock service from an async function of the attempt number
/// (starting at 1), counting calls in `calls`.
pub fn counted<Req, Res, F, Fut>(
    calls: Arc<AtomicUsize>,
    f: F,
) -> impl Service<Req, Response = Res, Error = Upstream, Future = Fut> + Clone + Send
where
    F: Fn(usize) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<Res, Upstream>> + Send + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
{
    tower::service_fn(move |_req: Req| {
        let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
        f(attempt)
    })
}
