//! The reset timeout runs on the wall clock, so these tests sleep for real.

use super::{scripted, CallError};
use bento_circuitbreaker::{CircuitBreakerLayer, CircuitState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::{Layer, Service, ServiceExt};

const RESET: Duration = Duration::from_millis(50);

#[tokio::test]
async fn successful_trial_closes() {
    let (service, calls) = scripted(vec![Some(503), Some(503)]);
    let layer = CircuitBreakerLayer::builder()
        .volume_threshold(2)
        .reset_timeout(RESET)
        .build();
    let mut cb = layer.layer(service);

    for _ in 0..2 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }
    assert!(layer.is_open());
    assert!(cb.ready().await.unwrap().call(()).await.is_err());

    tokio::time::sleep(RESET + Duration::from_millis(20)).await;
    cb.ready().await.unwrap().call(()).await.unwrap();

    assert_eq!(layer.state_sync(), CircuitState::Closed);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(layer.stats().volume(), 0, "window is cleared on transition");
}

#[tokio::test]
async fn failed_trial_reopens() {
    let (service, calls) = scripted(vec![Some(503), Some(503), Some(503)]);
    let layer = CircuitBreakerLayer::builder()
        .volume_threshold(2)
        .reset_timeout(RESET)
        .build();
    let mut cb = layer.layer(service);

    for _ in 0..2 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }
    tokio::time::sleep(RESET + Duration::from_millis(20)).await;

    let err = cb.ready().await.unwrap().call(()).await.unwrap_err();
    assert!(err.is_application());
    assert_eq!(layer.state_sync(), CircuitState::Open);

    let err = cb.ready().await.unwrap().call(()).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn only_one_trial_at_a_time() {
    let release = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let gate = Arc::clone(&release);
    let counter = Arc::clone(&calls);
    let service = tower::service_fn(move |slow: bool| {
        let gate = Arc::clone(&gate);
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if slow {
                gate.notified().await;
            }
            Ok::<_, CallError>(())
        }
    });

    let layer = CircuitBreakerLayer::builder()
        .volume_threshold(1)
        .reset_timeout(RESET)
        .build();
    let cb = layer.layer(service);

    layer.force_open();
    tokio::time::sleep(RESET + Duration::from_millis(20)).await;

    let trial = tokio::spawn(cb.clone().oneshot(true));
    while calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(layer.state_sync(), CircuitState::HalfOpen);

    let err = cb.clone().oneshot(false).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    release.notify_one();
    trial.await.unwrap().unwrap();
    assert_eq!(layer.state_sync(), CircuitState::Closed);

    cb.oneshot(false).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn abandoned_trial_frees_the_slot() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let service = tower::service_fn(move |hang: bool| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if hang {
                std::future::pending::<()>().await;
            }
            Ok::<_, CallError>(())
        }
    });

    let layer = CircuitBreakerLayer::builder()
        .reset_timeout(RESET)
        .build();
    let cb = layer.layer(service);

    layer.force_open();
    tokio::time::sleep(RESET + Duration::from_millis(20)).await;

    let abandoned = tokio::time::timeout(Duration::from_millis(20), cb.clone().oneshot(true)).await;
    assert!(abandoned.is_err());
    assert_eq!(layer.state_sync(), CircuitState::HalfOpen);

    cb.oneshot(false).await.unwrap();
    assert_eq!(layer.state_sync(), CircuitState::Closed);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
