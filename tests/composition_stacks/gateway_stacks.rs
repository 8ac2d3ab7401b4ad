//! Stacks built from the gateway's own configuration.

use super::test_utils::{counted, Upstream};
use bento_circuitbreaker::CircuitState;
use bento_gateway::GatewayConfig;
use bento_resilience::ResilienceRegistry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

#[tokio::test(start_paused = true)]
async fn default_stack_retries_server_errors_three_times() {
    let options = GatewayConfig::default().resilience_options();
    let registry = ResilienceRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let service = registry.compose(
        "post",
        &options,
        counted(calls.clone(), |_| async { Err::<(), _>(Upstream::Status(502)) }),
    );

    let err = service.oneshot(()).await.unwrap_err();

    assert_eq!(err.application_error(), Some(Upstream::Status(502)));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(registry.circuit_breaker("post").stats().failures, 1);
}

#[tokio::test(start_paused = true)]
async fn default_breaker_opens_after_five_failed_calls() {
    let options = GatewayConfig::default().resilience_options();
    let registry = ResilienceRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let service = registry.compose(
        "notification",
        &options,
        counted(calls.clone(), |_| async { Err::<(), _>(Upstream::Refused) }),
    );

    for _ in 0..5 {
        service.clone().oneshot(()).await.unwrap_err();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 20);
    assert!(registry.circuit_breaker("notification").is_open());

    let err = service.oneshot(()).await.unwrap_err();
    assert_eq!(err.to_string(), "circuit breaker 'notification-cb' is open");
    assert_eq!(calls.load(Ordering::SeqCst), 20);
}

#[tokio::test]
async fn compositions_share_the_named_breaker() {
    let options = GatewayConfig::default().resilience_options();
    let registry = ResilienceRegistry::new();
    let reads = registry.compose(
        "user",
        &options,
        counted(Arc::new(AtomicUsize::new(0)), |_| async { Ok::<_, Upstream>("profile") }),
    );
    let writes = registry.compose(
        "user",
        &options,
        counted(Arc::new(AtomicUsize::new(0)), |_| async { Ok::<_, Upstream>("updated") }),
    );
    let posts = registry.compose(
        "post",
        &options,
        counted(Arc::new(AtomicUsize::new(0)), |_| async { Ok::<_, Upstream>("posts") }),
    );

    registry.circuit_breaker("user").force_open();

    assert!(reads.oneshot(()).await.unwrap_err().is_circuit_open());
    assert!(writes.oneshot(()).await.unwrap_err().is_circuit_open());
    assert_eq!(posts.oneshot(()).await.unwrap(), "posts");

    let names: Vec<_> = registry
        .breaker_stats()
        .into_iter()
        .map(|s| (s.name, s.state))
        .collect();
    assert_eq!(
        names,
        vec![
            ("post-cb".to_string(), CircuitState::Closed),
            ("user-cb".to_string(), CircuitState::Open),
        ]
    );
}

#[tokio::test]
async fn bulkhead_from_config_file() {
    let config = GatewayConfig::from_toml(
        r#"
        [resilience.bulkhead]
        enabled = true
        max_concurrent = 3
        max_queue = 7
        queue_timeout_ms = 250
        "#,
    )
    .unwrap();
    let options = config.resilience_options();
    let registry = ResilienceRegistry::new();
    let service = registry.compose(
        "upload",
        &options,
        counted(Arc::new(AtomicUsize::new(0)), |_| async { Ok::<_, Upstream>(()) }),
    );

    service.oneshot(()).await.unwrap();

    let stats = registry.bulkhead_stats();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].name, "upload-bh");
    assert_eq!(stats[0].max_concurrent, 3);
    assert_eq!(stats[0].max_queue, 7);
    assert_eq!(stats[0].total_executed, 1);
    assert_eq!(stats[0].active, 0);
}

#[tokio::test(start_paused = true)]
async fn configured_timeout_bounds_each_attempt() {
    let config = GatewayConfig::from_toml(
        r#"
        [resilience]
        timeout_ms = 2000

        [resilience.retry]
        enabled = false
        "#,
    )
    .unwrap();
    let registry = ResilienceRegistry::new();
    let service = registry.compose(
        "interaction",
        &config.resilience_options(),
        counted(Arc::new(AtomicUsize::new(0)), |_| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok::<_, Upstream>(())
        }),
    );

    let start = tokio::time::Instant::now();
    let err = service.oneshot(()).await.unwrap_err();

    assert!(err.is_timeout());
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(start.elapsed() < Duration::from_millis(2_100));
}
