//! Per-client fixed-window rate limiting for HTTP services.
//!
//! Each request is put in a [`RateCategory`] by its path and counted in a
//! window keyed by that category and the client's address. Limits default
//! to what the gateway has always enforced:
//!
//! | category | matches | limit |
//! |----------|---------|-------|
//! | auth     | `/authenticate`, `/register` | 20 per 15 min |
//! | upload   | `/upload` | 10 per min |
//! | rpc      | `/rpc/` | 500 per min |
//! | general  | anything else | 100 per min |
//!
//! Admitted responses carry `RateLimit-Limit`, `RateLimit-Remaining` and
//! `RateLimit-Reset`. Rejections surface as [`RateLimiterError`], which
//! converts into [`ResilienceError::RateLimited`](bento_resilience_core::ResilienceError).
//!
//! ```
//! use bento_ratelimiter::{RateCategory, RateLimiterLayer};
//! use bento_resilience_core::ResilienceError;
//! use http::{Request, Response};
//! use std::time::Duration;
//! use tower::{Layer, ServiceExt};
//!
//! # async fn example() {
//! let limiter = RateLimiterLayer::builder()
//!     .limit(RateCategory::General, 1, Duration::from_secs(60))
//!     .build();
//!
//! let service = limiter.layer(tower::service_fn(|_req: Request<()>| async {
//!     Ok::<_, ResilienceError<std::io::Error>>(Response::new(()))
//! }));
//!
//! let req = || Request::get("/v1/posts").header("x-forwarded-for", "203.0.113.9").body(()).unwrap();
//! let res = service.clone().oneshot(req()).await.unwrap();
//! assert_eq!(res.headers()["ratelimit-remaining"], "0");
//!
//! let err = service.oneshot(req()).await.unwrap_err();
//! assert!(err.is_rate_limited());
//! # }
//! ```

mod category;
mod config;
mod error;
mod events;
mod layer;
mod limiter;

pub use category::{CategoryLimit, RateCategory};
pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;
pub use layer::RateLimiterLayer;
pub use limiter::{
    FixedWindowLimiter, RateLimitInfo, RATELIMIT_LIMIT, RATELIMIT_REMAINING, RATELIMIT_RESET,
};

use futures::future::BoxFuture;
use http::{Request, Response};
use std::net::SocketAddr;
use std::sync::Once;
use std::task::{Context, Poll};
use tower::Service;

static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        #[cfg(feature = "metrics")]
        {
            metrics::describe_counter!(
                "ratelimiter_requests_total",
                "Requests seen by the rate limiter, by category and result"
            );
        }
    });
}

/// Address of the connected peer, set as a request extension by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// The key a request is counted under: the first `x-forwarded-for` hop,
/// else the peer's IP, else `"unknown"`.
pub fn client_key<B>(req: &Request<B>) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());

    if let Some(hop) = forwarded {
        return hop.to_string();
    }

    match req.extensions().get::<PeerAddr>() {
        Some(PeerAddr(addr)) => addr.ip().to_string(),
        None => String::from("unknown"),
    }
}

/// A Tower [`Service`] that rate limits requests before they reach the
/// inner service.
pub struct RateLimiter<S> {
    inner: S,
    layer: RateLimiterLayer,
}

impl<S> RateLimiter<S> {
    pub(crate) fn new(inner: S, layer: RateLimiterLayer) -> Self {
        Self { inner, layer }
    }
}

impl<S> Clone for RateLimiter<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            layer: self.layer.clone(),
        }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RateLimiter<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: From<RateLimiterError> + Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        match self.layer.check(&req) {
            Ok(None) => Box::pin(inner.call(req)),
            Ok(Some(info)) => Box::pin(async move {
                let mut response = inner.call(req).await?;
                info.apply(response.headers_mut());
                Ok(response)
            }),
            Err(err) => Box::pin(async move { Err(err.into()) }),
        }
    }
}
