use super::{gated, wait_for};
use bento_bulkhead::BulkheadLayer;
use bento_resilience_core::{RejectReason, ResilienceError};
use std::sync::Arc;
use tokio::sync::Notify;
use tower::{Layer, Service, ServiceExt};

#[tokio::test]
async fn third_call_queues_and_fourth_is_rejected() {
    let layer = BulkheadLayer::builder()
        .name("media-bh")
        .max_concurrent_calls(2)
        .max_queue(1)
        .build();
    let service = layer.layer(gated());

    let gates: Vec<_> = (0..3).map(|_| Arc::new(Notify::new())).collect();
    let first = tokio::spawn(service.clone().oneshot(Arc::clone(&gates[0])));
    let second = tokio::spawn(service.clone().oneshot(Arc::clone(&gates[1])));
    wait_for(&layer, |s| s.active == 2).await;

    let third = tokio::spawn(service.clone().oneshot(Arc::clone(&gates[2])));
    wait_for(&layer, |s| s.queued == 1).await;

    let err = service
        .clone()
        .oneshot(Arc::new(Notify::new()))
        .await
        .unwrap_err();
    match err {
        ResilienceError::BulkheadRejected { name, reason } => {
            assert_eq!(name, "media-bh");
            assert_eq!(reason, RejectReason::QueueFull);
        }
        other => panic!("expected a bulkhead rejection, got {:?}", other),
    }

    // Finishing the first call hands its slot to the queued one.
    gates[2].notify_one();
    gates[0].notify_one();
    first.await.unwrap().unwrap();
    third.await.unwrap().unwrap();

    let stats = layer.stats();
    assert_eq!(stats.active, 1);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.total_executed, 2);
    assert_eq!(stats.total_rejected, 1);

    gates[1].notify_one();
    second.await.unwrap().unwrap();
    assert_eq!(layer.stats().active, 0);
}

#[tokio::test]
async fn without_a_queue_a_busy_bulkhead_is_full() {
    let layer = BulkheadLayer::builder()
        .max_concurrent_calls(1)
        .max_queue(0)
        .build();
    let service = layer.layer(gated());

    let gate = Arc::new(Notify::new());
    let running = tokio::spawn(service.clone().oneshot(Arc::clone(&gate)));
    wait_for(&layer, |s| s.active == 1).await;

    let err = service.clone().oneshot(Arc::new(Notify::new())).await.unwrap_err();
    assert!(matches!(
        err,
        ResilienceError::BulkheadFull {
            concurrent_calls: 1,
            max_concurrent: 1
        }
    ));

    gate.notify_one();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn application_errors_release_the_slot() {
    let layer = BulkheadLayer::builder().max_concurrent_calls(1).build();
    let mut service = layer.layer(tower::service_fn(|fail: bool| async move {
        if fail {
            Err(ResilienceError::Application(std::io::Error::other("refused")))
        } else {
            Ok(())
        }
    }));

    let err = service.ready().await.unwrap().call(true).await.unwrap_err();
    assert!(err.is_application());
    service.ready().await.unwrap().call(false).await.unwrap();

    let stats = layer.stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.total_executed, 2);
}

#[tokio::test]
async fn execute_runs_closures_under_the_same_limit() {
    let layer = BulkheadLayer::builder()
        .max_concurrent_calls(1)
        .max_queue(0)
        .build();
    let service = layer.layer(gated());

    let gate = Arc::new(Notify::new());
    let running = tokio::spawn(service.oneshot(Arc::clone(&gate)));
    wait_for(&layer, |s| s.active == 1).await;

    let answer: Result<u32, bento_bulkhead::BulkheadError> = layer.execute(|| async { Ok(7) }).await;
    assert!(matches!(
        answer,
        Err(bento_bulkhead::BulkheadError::BulkheadFull { .. })
    ));

    gate.notify_one();
    running.await.unwrap().unwrap();
    assert_eq!(layer.execute(|| async { Ok::<_, bento_bulkhead::BulkheadError>(7) }).await, Ok(7));
}
