//! Response cache metrics regression tests

use super::helpers::*;
use bento_cache::CacheLayer;
use bytes::Bytes;
use http::{Request, Response};
use serial_test::serial;
use tower::{Layer, ServiceExt};

#[tokio::test]
#[serial]
async fn cache_metrics_exist() {
    init_recorder();

    let layer = CacheLayer::builder()
        .name("metrics-cache")
        .default_rules()
        .build();
    let service = layer.layer(tower::service_fn(|_req: Request<Bytes>| async {
        Ok::<_, std::io::Error>(Response::new(Bytes::from_static(b"[]")))
    }));

    let get = || Request::get("/v1/topics").body(Bytes::new()).unwrap();
    service.clone().oneshot(get()).await.unwrap();
    service.clone().oneshot(get()).await.unwrap();
    service
        .oneshot(Request::post("/v1/topics").body(Bytes::new()).unwrap())
        .await
        .unwrap();

    assert_counter_exists("cache_requests_total");
    assert_metric_has_label("cache_requests_total", "cache", "metrics-cache");
    assert_metric_has_label("cache_requests_total", "result", "hit");
    assert_metric_has_label("cache_requests_total", "result", "miss");

    assert!(counter_total("cache_requests_total", "cache", "metrics-cache") >= 2);

    assert_counter_exists("cache_invalidations_total");
    assert!(counter_total("cache_invalidations_total", "cache", "metrics-cache") >= 1);
    assert_gauge_exists("cache_size");
    assert_metric_has_label("cache_size", "cache", "metrics-cache");
}
