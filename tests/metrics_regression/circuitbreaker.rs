//! Circuit breaker metrics regression tests

use super::helpers::*;
use bento_circuitbreaker::CircuitBreakerLayer;
use bento_resilience_core::ResilienceError;
use serial_test::serial;
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};

type TestError = ResilienceError<&'static str>;

#[tokio::test]
#[serial]
async fn circuitbreaker_metrics_exist() {
    init_recorder();

    let layer = CircuitBreakerLayer::builder()
        .name("metrics-cb")
        .error_threshold_percentage(50.0)
        .volume_threshold(2)
        .reset_timeout(Duration::from_secs(60))
        .build();

    let mut service = layer.layer(tower::service_fn(|fail: bool| async move {
        if fail {
            Err::<(), TestError>(ResilienceError::Application("boom"))
        } else {
            Ok(())
        }
    }));

    // success, failure, then a rejection once the circuit is open
    let _ = service.ready().await.unwrap().call(false).await;
    let _ = service.ready().await.unwrap().call(true).await;
    let _ = service.ready().await.unwrap().call(false).await;

    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "metrics-cb");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "permitted");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");

    assert_counter_exists("circuitbreaker_successes_total");
    assert_counter_exists("circuitbreaker_failures_total");
    assert_metric_has_label("circuitbreaker_failures_total", "circuitbreaker", "metrics-cb");

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "closed");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "open");

    assert_gauge_exists("circuitbreaker_state");
    assert_metric_has_label("circuitbreaker_state", "circuitbreaker", "metrics-cb");
}
