use super::{gated, wait_for};
use bento_bulkhead::BulkheadLayer;
use bento_resilience_core::{RejectReason, ResilienceError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::{Layer, ServiceExt};

#[tokio::test(start_paused = true)]
async fn queued_calls_give_up_after_the_queue_timeout() {
    let layer = BulkheadLayer::builder()
        .max_concurrent_calls(1)
        .max_queue(5)
        .queue_timeout(Duration::from_millis(100))
        .build();
    let service = layer.layer(gated());

    let gate = Arc::new(Notify::new());
    let running = tokio::spawn(service.clone().oneshot(Arc::clone(&gate)));
    wait_for(&layer, |s| s.active == 1).await;

    let err = service.clone().oneshot(Arc::new(Notify::new())).await.unwrap_err();
    assert!(matches!(
        err,
        ResilienceError::BulkheadRejected {
            reason: RejectReason::QueueTimeout,
            ..
        }
    ));
    assert_eq!(layer.stats().queued, 0);
    assert_eq!(layer.stats().total_rejected, 1);

    gate.notify_one();
    running.await.unwrap().unwrap();
    assert_eq!(layer.stats().active, 0);
}

#[tokio::test]
async fn shutdown_rejects_waiters_and_stays_usable() {
    let rejected = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&rejected);
    let layer = BulkheadLayer::builder()
        .max_concurrent_calls(1)
        .max_queue(5)
        .on_call_rejected(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
        .build();
    let service = layer.layer(gated());

    let gate = Arc::new(Notify::new());
    let running = tokio::spawn(service.clone().oneshot(Arc::clone(&gate)));
    wait_for(&layer, |s| s.active == 1).await;

    let waiting: Vec<_> = (0..2)
        .map(|_| tokio::spawn(service.clone().oneshot(Arc::new(Notify::new()))))
        .collect();
    wait_for(&layer, |s| s.queued == 2).await;

    layer.shutdown();
    for waiter in waiting {
        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ResilienceError::BulkheadRejected {
                reason: RejectReason::Shutdown,
                ..
            }
        ));
    }
    assert_eq!(rejected.load(std::sync::atomic::Ordering::SeqCst), 2);

    gate.notify_one();
    running.await.unwrap().unwrap();

    let gate = Arc::new(Notify::new());
    gate.notify_one();
    service.oneshot(gate).await.unwrap();
}
