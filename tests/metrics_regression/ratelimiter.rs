//! Rate limiter metrics regression tests

use super::helpers::*;
use bento_ratelimiter::{RateCategory, RateLimiterLayer};
use http::Request;
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn ratelimiter_metrics_exist() {
    init_recorder();

    let limiter = RateLimiterLayer::builder()
        .name("metrics-rl")
        .limit(RateCategory::Upload, 1, Duration::from_secs(60))
        .build();
    let req = || {
        Request::post("/v1/upload-file")
            .header("x-forwarded-for", "192.0.2.44")
            .body(())
            .unwrap()
    };

    assert!(limiter.check(&req()).is_ok());
    assert!(limiter.check(&req()).is_err());

    assert_counter_exists("ratelimiter_requests_total");
    assert_metric_has_label("ratelimiter_requests_total", "limiter", "metrics-rl");
    assert_metric_has_label("ratelimiter_requests_total", "category", "upload");
    assert_metric_has_label("ratelimiter_requests_total", "result", "admitted");
    assert_metric_has_label("ratelimiter_requests_total", "result", "rejected");
    assert!(counter_total("ratelimiter_requests_total", "limiter", "metrics-rl") >= 2);
}
