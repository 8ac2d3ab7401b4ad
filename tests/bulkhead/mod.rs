//! Bulkhead behavior through the public layer API.
//!
//! Test organization:
//! - permits.rs: slot and queue limits
//! - timeout.rs: queue timeout and shutdown
//! - concurrency.rs: many callers at once

mod concurrency;
mod permits;
mod timeout;

use bento_bulkhead::BulkheadLayer;
use bento_resilience_core::ResilienceError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::util::BoxCloneService;

pub type CallError = ResilienceError<std::io::Error>;

/// A service that holds its slot until the request's gate is notified.
pub fn gated() -> BoxCloneService<Arc<Notify>, (), CallError> {
    BoxCloneService::new(tower::service_fn(|gate: Arc<Notify>| async move {
        gate.notified().await;
        Ok::<_, CallError>(())
    }))
}

/// Waits until `check` holds for the bulkhead's stats.
pub async fn wait_for(layer: &BulkheadLayer, check: impl Fn(&bento_bulkhead::BulkheadStats) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check(&layer.stats()) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("bulkhead never reached the expected state");
}
