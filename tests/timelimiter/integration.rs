use super::{sleeper, CallError};
use bento_resilience_core::ResilienceError;
use bento_timelimiter::{TimeLimiterLayer, TIMEOUTS};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceExt};

#[tokio::test(start_paused = true)]
async fn fast_calls_pass_through() {
    let layer = TimeLimiterLayer::with_timeout(Duration::from_secs(1));
    let service = layer.layer(sleeper(Arc::new(AtomicBool::new(false))));

    let answer = service.oneshot(Duration::from_millis(200)).await.unwrap();
    assert_eq!(answer, "done");
}

#[tokio::test(start_paused = true)]
async fn slow_calls_time_out() {
    let timeouts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&timeouts);
    let layer = TimeLimiterLayer::builder()
        .timeout_duration(TIMEOUTS.fast)
        .name("users")
        .on_timeout(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    let service = layer.layer(sleeper(Arc::new(AtomicBool::new(false))));

    let err = service.oneshot(Duration::from_secs(2)).await.unwrap_err();

    assert!(err.is_timeout());
    assert!(matches!(
        err,
        ResilienceError::Timeout {
            layer: "time_limiter"
        }
    ));
    assert_eq!(timeouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn errors_within_budget_are_returned_as_is() {
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&errors);
    let layer = TimeLimiterLayer::builder()
        .timeout_duration(Duration::from_secs(5))
        .on_error(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    let service = layer.layer(tower::service_fn(|_req: ()| async {
        Err::<(), CallError>(ResilienceError::Application(std::io::Error::other(
            "connection reset",
        )))
    }));

    let err = service.oneshot(()).await.unwrap_err();

    assert!(err.is_application());
    assert_eq!(err.to_string(), "connection reset");
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[test]
fn timeout_table() {
    assert_eq!(TIMEOUTS.fast, Duration::from_secs(1));
    assert_eq!(TIMEOUTS.standard, Duration::from_secs(5));
    assert_eq!(TIMEOUTS.database, Duration::from_secs(10));
    assert_eq!(TIMEOUTS.external, Duration::from_secs(30));
    assert_eq!(TIMEOUTS.upload, Duration::from_secs(60));
    assert_eq!(TIMEOUTS.long, Duration::from_secs(120));
}
