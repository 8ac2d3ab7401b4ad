//! Time limiter metrics regression tests

use super::helpers::*;
use bento_resilience_core::ResilienceError;
use bento_timelimiter::TimeLimiterLayer;
use serial_test::serial;
use std::time::Duration;
use tower::{Layer, ServiceExt};

type TestError = ResilienceError<std::io::Error>;

#[tokio::test]
#[serial]
async fn timelimiter_metrics_exist() {
    init_recorder();

    let layer = TimeLimiterLayer::builder()
        .name("metrics-tl")
        .timeout_duration(Duration::from_millis(50))
        .cancel_running_future(true)
        .build();

    let service = layer.layer(tower::service_fn(|delay: Duration| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, TestError>(())
    }));

    service.clone().oneshot(Duration::ZERO).await.unwrap();
    service.oneshot(Duration::from_secs(1)).await.unwrap_err();

    assert_counter_exists("timelimiter_calls_total");
    assert_metric_has_label("timelimiter_calls_total", "timelimiter", "metrics-tl");
    assert_metric_has_label("timelimiter_calls_total", "result", "success");
    assert_metric_has_label("timelimiter_calls_total", "result", "timeout");

    assert_histogram_exists("timelimiter_call_duration_seconds");
    assert_metric_has_label("timelimiter_call_duration_seconds", "timelimiter", "metrics-tl");
}
