use super::{failing, Failure};
use bento_retry::{ExponentialBackoff, FnInterval, RetryLayer};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tower::{Layer, ServiceExt};

#[tokio::test(start_paused = true)]
async fn exponential_delays_without_jitter() {
    let delays = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&delays);
    let (service, _) = failing(3, Failure::Refused);
    let layer = RetryLayer::<Failure>::builder()
        .retries(3)
        .factor(2.0)
        .min_delay(Duration::from_secs(1))
        .max_delay(Duration::from_secs(10))
        .jitter(false)
        .on_retry(move |attempt, delay| seen.lock().unwrap().push((attempt, delay)))
        .build();

    let start = Instant::now();
    layer.layer(service).oneshot("GET /v1/posts").await.unwrap();

    assert_eq!(
        *delays.lock().unwrap(),
        vec![
            (1, Duration::from_secs(1)),
            (2, Duration::from_secs(2)),
            (3, Duration::from_secs(4)),
        ]
    );
    assert!(start.elapsed() >= Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn delays_are_capped() {
    let delays = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&delays);
    let (service, _) = failing(4, Failure::Refused);
    let layer = RetryLayer::<Failure>::builder()
        .retries(4)
        .factor(10.0)
        .min_delay(Duration::from_secs(1))
        .max_delay(Duration::from_secs(10))
        .jitter(true)
        .on_retry(move |_, delay| seen.lock().unwrap().push(delay))
        .build();

    layer.layer(service).oneshot("GET /v1/posts").await.unwrap();

    let delays = delays.lock().unwrap();
    assert_eq!(delays.len(), 4);
    assert!(delays[0] >= Duration::from_secs(1) && delays[0] < Duration::from_secs(2));
    assert!(delays.iter().all(|d| *d <= Duration::from_secs(10)));
    assert_eq!(delays[3], Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn custom_interval_functions() {
    let (service, _) = failing(2, Failure::Refused);
    let layer = RetryLayer::<Failure>::builder()
        .retries(2)
        .backoff(FnInterval::new(|attempt| Duration::from_millis(100 * (attempt as u64 + 1))))
        .build();

    let start = Instant::now();
    layer.layer(service).oneshot("GET /v1/posts").await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(400));
}

#[test]
fn policy_exposes_the_schedule() {
    let layer = RetryLayer::<Failure>::builder()
        .retries(3)
        .backoff(ExponentialBackoff::new(Duration::from_millis(200)).multiplier(3.0))
        .build();
    let policy = layer.config().policy();

    assert_eq!(policy.max_attempts(), 4);
    assert_eq!(policy.next_backoff(0), Duration::from_millis(200));
    assert_eq!(policy.next_backoff(2), Duration::from_millis(1800));
    assert!(policy.should_retry(&Failure::Status(404)));
}
