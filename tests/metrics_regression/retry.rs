//! Retry metrics regression tests

use super::helpers::*;
use bento_retry::RetryLayer;
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceExt};

#[tokio::test]
#[serial]
async fn retry_metrics_exist() {
    init_recorder();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let layer = RetryLayer::<&'static str>::builder()
        .name("metrics-retry")
        .retries(2)
        .fixed_backoff(Duration::from_millis(1))
        .build();

    let flaky = layer.layer(tower::service_fn(move |_: ()| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Err("transient")
            } else {
                Ok(n)
            }
        }
    }));
    flaky.oneshot(()).await.unwrap();

    let broken = layer.layer(tower::service_fn(|_: ()| async { Err::<(), _>("down") }));
    broken.oneshot(()).await.unwrap_err();

    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "retry", "metrics-retry");
    assert_metric_has_label("retry_calls_total", "outcome", "success");
    assert_metric_has_label("retry_calls_total", "outcome", "exhausted");

    assert_counter_exists("retry_attempts_total");
    assert_metric_has_label("retry_attempts_total", "retry", "metrics-retry");
}

#[tokio::test]
#[serial]
async fn retry_bail_is_labelled() {
    init_recorder();

    let layer = RetryLayer::<&'static str>::builder()
        .name("metrics-bail")
        .retry_on(|err: &&'static str| *err != "fatal")
        .build();

    let service = layer.layer(tower::service_fn(|_: ()| async { Err::<(), _>("fatal") }));
    service.oneshot(()).await.unwrap_err();

    assert_metric_has_label("retry_calls_total", "outcome", "bailed");
}
