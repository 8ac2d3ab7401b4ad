use super::from;
use bento_ratelimiter::{RateCategory, RateLimiterLayer, RATELIMIT_REMAINING};
use bento_resilience::{BreakerOptions, ResilienceOptions, ResilienceRegistry};
use bento_resilience_core::{Classify, FailureKind, ResilienceError};
use http::{Request, Response};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::util::BoxCloneService;
use tower::{Layer, ServiceExt};

#[derive(Debug, Clone)]
struct Refused;

impl std::fmt::Display for Refused {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("connection refused")
    }
}

impl std::error::Error for Refused {}

impl Classify for Refused {
    fn failure_kind(&self) -> FailureKind {
        FailureKind::Network
    }
}

type Stack = BoxCloneService<Request<()>, Response<()>, ResilienceError<Refused>>;

fn guarded(registry: &ResilienceRegistry, calls: Arc<AtomicUsize>) -> Stack {
    let upstream = tower::service_fn(move |_path: String| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, Refused>(Response::new(())) }
    });
    let options = ResilienceOptions::none().with_circuit_breaker(BreakerOptions::default());
    BoxCloneService::new(
        registry
            .compose("post", &options, upstream)
            .map_request(|req: Request<()>| req.uri().path().to_string()),
    )
}

#[tokio::test]
async fn rejected_requests_never_reach_the_breaker() {
    let registry = ResilienceRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let limiter = RateLimiterLayer::builder()
        .limit(RateCategory::General, 2, Duration::from_secs(60))
        .build();
    let service = limiter.layer(guarded(&registry, calls.clone()));

    for remaining in ["1", "0"] {
        let res = service
            .clone()
            .oneshot(from("192.0.2.1", "/v1/posts"))
            .await
            .unwrap();
        assert_eq!(res.headers()[RATELIMIT_REMAINING], remaining);
    }

    let err = service
        .oneshot(from("192.0.2.1", "/v1/posts"))
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let stats = registry.circuit_breaker("post").stats();
    assert_eq!(stats.successes, 2);
    assert_eq!(stats.failures, 0);
}

#[tokio::test]
async fn rejection_carries_retry_after() {
    let registry = ResilienceRegistry::new();
    let limiter = RateLimiterLayer::builder()
        .limit(RateCategory::Rpc, 1, Duration::from_secs(30))
        .build();
    let service = limiter.layer(guarded(&registry, Arc::new(AtomicUsize::new(0))));

    service
        .clone()
        .oneshot(from("192.0.2.1", "/v1/rpc/posts/by-ids"))
        .await
        .unwrap();
    let err = service
        .oneshot(from("192.0.2.1", "/v1/rpc/posts/by-ids"))
        .await
        .unwrap_err();

    match err {
        ResilienceError::RateLimited { retry_after } => {
            let wait = retry_after.unwrap();
            assert!(wait <= Duration::from_secs(30));
            assert!(wait > Duration::from_secs(29));
        }
        other => panic!("expected a rate limit rejection, got {:?}", other),
    }
}
