use super::scripted;
use bento_circuitbreaker::{CircuitBreakerLayer, CircuitState};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};

/// 3 failures and 2 successes is 60%, over a 50% threshold.
#[tokio::test]
async fn opens_once_volume_is_reached_above_threshold() {
    let (service, calls) = scripted(vec![Some(503), Some(503), Some(503), None, None]);
    let layer = CircuitBreakerLayer::builder()
        .name("posts-cb")
        .error_threshold_percentage(50.0)
        .volume_threshold(5)
        .reset_timeout(Duration::from_secs(30))
        .build();
    let mut cb = layer.layer(service);

    for _ in 0..5 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }
    assert_eq!(layer.state_sync(), CircuitState::Open);

    let err = cb.ready().await.unwrap().call(()).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(err.to_string(), "circuit breaker 'posts-cb' is open");
    assert_eq!(calls.load(Ordering::SeqCst), 5, "rejected call reached the service");
}

/// 2 failures out of 5 is 40%, under a 50% threshold.
#[tokio::test]
async fn stays_closed_below_threshold() {
    let (service, calls) = scripted(vec![Some(503), Some(503), None, None, None]);
    let layer = CircuitBreakerLayer::builder()
        .error_threshold_percentage(50.0)
        .volume_threshold(5)
        .build();
    let mut cb = layer.layer(service);

    for _ in 0..6 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }

    assert_eq!(layer.state_sync(), CircuitState::Closed);
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

/// Exactly at the threshold opens.
#[tokio::test]
async fn failure_rate_exactly_at_threshold() {
    let (service, _) = scripted(vec![Some(500), None, Some(500), None]);
    let layer = CircuitBreakerLayer::builder()
        .error_threshold_percentage(50.0)
        .volume_threshold(4)
        .build();
    let mut cb = layer.layer(service);

    for _ in 0..4 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }

    assert_eq!(layer.state_sync(), CircuitState::Open);
}

#[tokio::test]
async fn no_decision_below_volume_threshold() {
    let (service, _) = scripted(vec![Some(503); 5]);
    let layer = CircuitBreakerLayer::builder()
        .error_threshold_percentage(50.0)
        .volume_threshold(5)
        .build();
    let mut cb = layer.layer(service);

    for _ in 0..4 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }
    let stats = layer.stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.failures, 4);
    assert_eq!(stats.failure_rate, 100.0);

    let _ = cb.ready().await.unwrap().call(()).await;
    assert_eq!(layer.state_sync(), CircuitState::Open);
}

/// Outcomes older than the rolling window no longer count.
#[tokio::test]
async fn old_outcomes_leave_the_window() {
    let (service, _) = scripted(vec![Some(503), Some(503), Some(503), None, None]);
    let layer = CircuitBreakerLayer::builder()
        .error_threshold_percentage(50.0)
        .volume_threshold(5)
        .rolling_window(Duration::from_millis(50))
        .build();
    let mut cb = layer.layer(service);

    for _ in 0..3 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }
    tokio::time::sleep(Duration::from_millis(80)).await;
    for _ in 0..2 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }

    let stats = layer.stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.volume(), 2);
    assert_eq!(stats.failures, 0);
}

#[tokio::test]
async fn transitions_are_reported() {
    let transitions = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = std::sync::Arc::clone(&transitions);
    let (service, _) = scripted(vec![Some(502); 2]);
    let layer = CircuitBreakerLayer::builder()
        .volume_threshold(2)
        .on_state_transition(move |from, to| seen.lock().unwrap().push((from, to)))
        .build();
    let mut cb = layer.layer(service);

    for _ in 0..2 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }

    assert_eq!(
        *transitions.lock().unwrap(),
        vec![(CircuitState::Closed, CircuitState::Open)]
    );
}
