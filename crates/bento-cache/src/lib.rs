//! Rule-driven HTTP response cache for Tower services.
//!
//! Reads whose method and path match a [`CacheRule`] are answered from
//! memory while the stored response is fresh. Only 2xx responses are
//! stored. Every answer the cache takes part in is tagged with `X-Cache`
//! (`HIT` or `MISS`); hits also carry `X-Cache-TTL`, the milliseconds left
//! before the entry goes stale.
//!
//! A successful write (POST, PUT, PATCH, DELETE) clears every entry whose
//! key shares a resource fragment with the written path. See
//! [`ResponseCache::invalidate_for_write`] for how coarse that is.
//!
//! ```
//! use bento_cache::CacheLayer;
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use tower::{Layer, ServiceExt};
//!
//! # async fn example() -> Result<(), std::convert::Infallible> {
//! let cache = CacheLayer::builder().default_rules().build();
//! let service = cache.layer(tower::service_fn(|_req: Request<Bytes>| async {
//!     Ok::<_, std::convert::Infallible>(Response::new(Bytes::from_static(b"[]")))
//! }));
//!
//! let req = Request::get("/v1/topics").body(Bytes::new()).unwrap();
//! let res = service.clone().oneshot(req).await?;
//! assert_eq!(res.headers()["x-cache"], "MISS");
//!
//! let req = Request::get("/v1/topics").body(Bytes::new()).unwrap();
//! let res = service.oneshot(req).await?;
//! assert_eq!(res.headers()["x-cache"], "HIT");
//! # Ok(())
//! # }
//! ```
//!
//! Callers are told apart by a [`CallerId`] request extension, set by
//! whatever authenticates the request upstream of the cache.

mod config;
mod error;
mod events;
mod layer;
mod rules;
mod store;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use error::CacheError;
pub use events::CacheEvent;
pub use layer::CacheLayer;
pub use rules::{cache_key, default_rules, CacheRule};
pub use store::{CacheStats, CachedResponse, ResponseCache};

use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{HeaderName, HeaderValue, CACHE_CONTROL};
use http::{Method, Request, Response};
use std::sync::{Arc, Once};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;

static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        #[cfg(feature = "metrics")]
        {
            use metrics::{describe_counter, describe_gauge};

            describe_counter!(
                "cache_requests_total",
                "Cacheable reads by result (hit or miss)"
            );
            describe_counter!(
                "cache_invalidations_total",
                "Entries removed by write invalidation"
            );
            describe_gauge!("cache_size", "Number of entries in the cache");
        }
    });
}

/// Identity of the authenticated caller, read from request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(pub String);

/// `X-Cache` response header.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
/// `X-Cache-TTL` response header.
pub const X_CACHE_TTL: HeaderName = HeaderName::from_static("x-cache-ttl");

fn is_write(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn bypasses_cache<B>(req: &Request<B>) -> bool {
    req.headers()
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("no-cache"))
}

/// A Tower [`Service`] that caches HTTP responses.
pub struct Cache<S> {
    inner: S,
    config: Arc<CacheConfig>,
    store: Arc<ResponseCache>,
}

impl<S> Cache<S> {
    pub(crate) fn new(inner: S, config: Arc<CacheConfig>, store: Arc<ResponseCache>) -> Self {
        Self {
            inner,
            config,
            store,
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }
}

impl<S: Clone> Clone for Cache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> Service<Request<Bytes>> for Cache<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response<Bytes>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Bytes>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let config = Arc::clone(&self.config);
        let store = Arc::clone(&self.store);

        if is_write(req.method()) {
            let path = req.uri().path().to_string();
            return Box::pin(async move {
                let response = inner.call(req).await?;
                if response.status().is_success() {
                    layer::invalidate(&config, &store, &path);

                    #[cfg(feature = "metrics")]
                    metrics::gauge!("cache_size", "cache" => config.name.clone())
                        .set(store.len() as f64);
                }
                Ok(response)
            });
        }

        let rule = match config.find_rule(req.method(), req.uri().path()) {
            Some(rule) if !bypasses_cache(&req) => rule,
            _ => return Box::pin(inner.call(req)),
        };

        let caller = req.extensions().get::<CallerId>().map(|c| c.0.as_str());
        let key = cache_key(
            req.method(),
            req.uri().path(),
            req.uri().query(),
            caller,
            rule.varies_by_user(),
        );
        let ttl = rule.ttl();

        if let Some(hit) = store.get(&key) {
            config.event_listeners.emit(&CacheEvent::Hit {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                key,
            });

            #[cfg(feature = "metrics")]
            metrics::counter!("cache_requests_total", "cache" => config.name.clone(), "result" => "hit")
                .increment(1);

            let remaining = hit.remaining().as_millis().to_string();
            let mut response = Response::new(hit.body);
            *response.status_mut() = hit.status;
            *response.headers_mut() = hit.headers;
            response
                .headers_mut()
                .insert(X_CACHE, HeaderValue::from_static("HIT"));
            if let Ok(value) = HeaderValue::from_str(&remaining) {
                response.headers_mut().insert(X_CACHE_TTL, value);
            }
            return Box::pin(async move { Ok(response) });
        }

        config.event_listeners.emit(&CacheEvent::Miss {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            key: key.clone(),
        });

        #[cfg(feature = "metrics")]
        metrics::counter!("cache_requests_total", "cache" => config.name.clone(), "result" => "miss")
            .increment(1);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            if response.status().is_success() {
                store.insert(
                    key,
                    CachedResponse::new(
                        response.status(),
                        response.headers(),
                        response.body().clone(),
                        ttl,
                    ),
                );

                #[cfg(feature = "metrics")]
                metrics::gauge!("cache_size", "cache" => config.name.clone())
                    .set(store.len() as f64);
            }
            response
                .headers_mut()
                .insert(X_CACHE, HeaderValue::from_static("MISS"));
            Ok(response)
        })
    }
}
