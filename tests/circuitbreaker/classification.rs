use super::{scripted, CallError, Upstream};
use bento_circuitbreaker::{CircuitBreakerLayer, CircuitState};
use bento_resilience_core::ResilienceError;
use tower::{Layer, Service, ServiceExt};

#[tokio::test]
async fn client_errors_do_not_trip_a_classifying_breaker() {
    let (service, _) = scripted(vec![Some(404); 10]);
    let layer = CircuitBreakerLayer::builder()
        .name("users-cb")
        .volume_threshold(5)
        .classify_errors()
        .build();
    let mut cb = layer.layer(service);

    for _ in 0..10 {
        let err = cb.ready().await.unwrap().call(()).await.unwrap_err();
        assert_eq!(err.as_application(), Some(&Upstream(404)));
    }

    let stats = layer.stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.successes, 10);
    assert_eq!(stats.failure_rate, 0.0);
}

#[tokio::test]
async fn every_error_counts_by_default() {
    let (service, _) = scripted(vec![Some(404); 5]);
    let layer = CircuitBreakerLayer::builder().volume_threshold(5).build();
    let mut cb = layer.layer(service);

    for _ in 0..5 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }

    assert_eq!(layer.state_sync(), CircuitState::Open);
}

#[tokio::test]
async fn throttling_counts_as_failure() {
    let (service, _) = scripted(vec![Some(429); 5]);
    let layer = CircuitBreakerLayer::builder()
        .volume_threshold(5)
        .classify_errors()
        .build();
    let mut cb = layer.layer(service);

    for _ in 0..5 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }

    assert_eq!(layer.state_sync(), CircuitState::Open);
}

#[tokio::test]
async fn timeouts_are_tracked_apart_from_failures() {
    let service = tower::service_fn(|fail: bool| async move {
        if fail {
            Err::<(), CallError>(ResilienceError::Timeout {
                layer: "time_limiter",
            })
        } else {
            Ok(())
        }
    });
    let layer = CircuitBreakerLayer::builder()
        .volume_threshold(10)
        .classify_errors()
        .build();
    let mut cb = layer.layer(service);

    for fail in [true, false, true, false] {
        let _ = cb.ready().await.unwrap().call(fail).await;
    }

    let stats = layer.stats();
    assert_eq!(stats.timeouts, 2);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.successes, 2);
    assert_eq!(stats.failure_rate, 50.0);
}

#[tokio::test]
async fn custom_classifier_decides_failures() {
    // Only 503 counts.
    let (service, _) = scripted(vec![Some(500), Some(500), Some(503), Some(503)]);
    let layer = CircuitBreakerLayer::builder()
        .volume_threshold(4)
        .error_threshold_percentage(75.0)
        .failure_classifier(|result: &Result<(), CallError>| {
            matches!(result, Err(ResilienceError::Application(Upstream(503))))
        })
        .build();
    let mut cb = layer.layer(service);

    for _ in 0..4 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }

    let stats = layer.stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.failures, 2);
}
