//! The request path: rate limit, cache, route, resilient forward.

use crate::config::{ConfigError, GatewayConfig};
use crate::error::GatewayError;
use crate::upstream::{ForwardBody, ForwardRequest, UpstreamError};
use axum::body::Body;
use axum::extract::ConnectInfo;
use bento_cache::{CacheLayer, CallerId};
use bento_ratelimiter::{PeerAddr, RateLimitInfo, RateLimiterLayer, RATELIMIT_LIMIT};
use bento_resilience::core::ResilienceError;
use bento_resilience::{ResilienceOptions, ResilienceRegistry};
use bento_router::Router;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_TYPE};
use http::request::Parts;
use http::{HeaderMap, Request, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service, ServiceExt};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Headers that describe one connection and never cross the proxy.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "content-length",
];

/// Everything a request needs, shared by every in-flight request.
///
/// The registry, cache and limiter are built once and injected here; the
/// dispatcher never creates them itself.
pub struct Gateway<C> {
    router: Router,
    services: HashMap<String, String>,
    registry: Arc<ResilienceRegistry>,
    options: ResilienceOptions,
    cache: Option<CacheLayer>,
    rate_limiter: Option<RateLimiterLayer>,
    pub(crate) client: C,
    request_deadline: Duration,
    body_limit: usize,
    started: Instant,
}

impl<C> Gateway<C> {
    /// A gateway over `router` and `services` with no cache or rate limit.
    ///
    /// Defaults:
    /// - resilience: [`ResilienceOptions::default`]
    /// - request deadline: 30s
    /// - body limit: 10 MiB
    pub fn new(router: Router, services: HashMap<String, String>, client: C) -> Self {
        crate::describe_metrics();
        Self {
            router,
            services,
            registry: Arc::new(ResilienceRegistry::new()),
            options: ResilienceOptions::default(),
            cache: None,
            rate_limiter: None,
            client,
            request_deadline: Duration::from_secs(30),
            body_limit: 10 * 1024 * 1024,
            started: Instant::now(),
        }
    }

    /// Builds every component `config` describes.
    pub fn from_config(config: &GatewayConfig, client: C) -> Result<Self, ConfigError> {
        Ok(Self::new(config.router()?, config.service_urls(), client)
            .with_options(config.resilience_options())
            .with_cache(config.cache_layer()?)
            .with_rate_limiter(config.rate_limiter())
            .with_request_deadline(config.request_deadline())
            .with_body_limit(config.proxy.body_limit_bytes))
    }

    pub fn with_registry(mut self, registry: Arc<ResilienceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_options(mut self, options: ResilienceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cache(mut self, cache: Option<CacheLayer>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Option<RateLimiterLayer>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Upper bound on the whole forward, retries included. A longer
    /// per-route timeout extends it for that route. Expiry is recorded by
    /// the service's breaker as a timeout.
    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn registry(&self) -> &Arc<ResilienceRegistry> {
        &self.registry
    }

    pub fn services(&self) -> &HashMap<String, String> {
        &self.services
    }

    pub fn cache(&self) -> Option<&CacheLayer> {
        self.cache.as_ref()
    }

    pub fn rate_limiter(&self) -> Option<&RateLimiterLayer> {
        self.rate_limiter.as_ref()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

impl<C> fmt::Debug for Gateway<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("routes", &self.router.rules().len())
            .field("services", &self.services)
            .field("options", &self.options)
            .field("cache", &self.cache.is_some())
            .field("rate_limiter", &self.rate_limiter.is_some())
            .field("request_deadline", &self.request_deadline)
            .finish()
    }
}

impl<C> Gateway<C>
where
    C: Service<ForwardRequest, Response = Response<Bytes>, Error = UpstreamError>
        + Clone
        + Send
        + Sync
        + 'static,
    C::Future: Send + 'static,
{
    /// Runs one request through the gateway. Never fails: every error
    /// becomes a JSON response.
    pub async fn handle(self: Arc<Self>, mut req: Request<Body>) -> Response<Body> {
        let started = Instant::now();
        let method = req.method().clone();
        let target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        let request_id = match req.headers().get(X_REQUEST_ID) {
            Some(id) => id.clone(),
            None => {
                let id = HeaderValue::try_from(Uuid::new_v4().to_string())
                    .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
                req.headers_mut().insert(X_REQUEST_ID, id.clone());
                id
            }
        };

        if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>().copied() {
            req.extensions_mut().insert(PeerAddr(addr));
        }
        if let Some(caller) = caller_id(req.headers()) {
            req.extensions_mut().insert(caller);
        }

        let limit = match &self.rate_limiter {
            Some(limiter) => match limiter.check(&req) {
                Ok(info) => info,
                Err(err) => {
                    let response = GatewayError::from(err).to_response();
                    return finish(response, &request_id, None, &method, &target, started);
                }
            },
            None => None,
        };

        let (parts, body) = req.into_parts();
        let response = if is_multipart(&parts.headers) {
            Arc::clone(&self)
                .forward(parts, ForwardBody::streaming(body))
                .await
        } else {
            match Limited::new(body, self.body_limit).collect().await {
                Ok(collected) => {
                    let req = Request::from_parts(parts, collected.to_bytes());
                    self.read_through(req).await
                }
                Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                    GatewayError::PayloadTooLarge {
                        limit: self.body_limit,
                    }
                    .to_response()
                }
                Err(err) => GatewayError::BadRequest(format!("failed to read request body: {}", err))
                    .to_response(),
            }
        };

        finish(response, &request_id, limit, &method, &target, started)
    }

    /// Buffered requests go through the response cache, when enabled.
    async fn read_through(self: Arc<Self>, req: Request<Bytes>) -> Response<Bytes> {
        let forwarder = Forwarder {
            gateway: Arc::clone(&self),
        };
        let result = match &self.cache {
            Some(cache) => cache.layer(forwarder).oneshot(req).await,
            None => forwarder.oneshot(req).await,
        };
        match result {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    /// Resolves the route and calls the service through its resilience
    /// stack. Upstream responses of any status pass through.
    async fn forward(self: Arc<Self>, parts: Parts, body: ForwardBody) -> Response<Bytes> {
        match self.try_forward(&parts, body).await {
            Ok(response) => response,
            Err(err) => {
                #[cfg(feature = "metrics")]
                metrics::counter!("gateway_errors_total", "error" => err.label())
                    .increment(1);

                tracing::warn!(
                    method = %parts.method,
                    path = parts.uri.path(),
                    status = err.status().as_u16(),
                    error = %err,
                    "request failed at the gateway"
                );
                err.to_response()
            }
        }
    }

    async fn try_forward(
        &self,
        parts: &Parts,
        body: ForwardBody,
    ) -> Result<Response<Bytes>, GatewayError> {
        let route = self
            .router
            .resolve(parts.uri.path(), &parts.method, &self.services)?;

        let url = match parts.uri.query() {
            Some(query) => format!("{}?{}", route.target_url, query),
            None => route.target_url.clone(),
        };

        let mut options = self.options.clone();
        if let Some(timeout) = route.timeout {
            options.timeout = Some(timeout);
        }
        options.deadline = Some(
            self.request_deadline
                .max(route.timeout.unwrap_or_default()),
        );
        if !body.is_replayable() {
            options.retry = None;
        }

        let request = ForwardRequest::new(parts.method.clone(), url)
            .forward_headers(&parts.headers)
            .body(body);

        tracing::debug!(
            method = %request.method,
            service = %route.service,
            url = %request.url,
            "forwarding"
        );

        let name = route.service.to_lowercase();
        let stack = self.registry.compose(&name, &options, self.client.clone());

        match stack.oneshot(request).await {
            Ok(response) => Ok(passthrough(response)),
            Err(ResilienceError::Application(UpstreamError::Status { response })) => {
                Ok(passthrough(response))
            }
            Err(err) => Err(GatewayError::from_resilience(&route.service, err)),
        }
    }
}

/// The innermost service under the response cache.
struct Forwarder<C> {
    gateway: Arc<Gateway<C>>,
}

impl<C> Clone for Forwarder<C> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl<C> Service<Request<Bytes>> for Forwarder<C>
where
    C: Service<ForwardRequest, Response = Response<Bytes>, Error = UpstreamError>
        + Clone
        + Send
        + Sync
        + 'static,
    C::Future: Send + 'static,
{
    type Response = Response<Bytes>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Bytes>) -> Self::Future {
        let gateway = Arc::clone(&self.gateway);
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            Ok(gateway.forward(parts, ForwardBody::Buffered(body)).await)
        })
    }
}

/// `tower::Service` front for a [`Gateway`], mounted as the router fallback.
pub struct Dispatcher<C> {
    gateway: Arc<Gateway<C>>,
}

impl<C> Dispatcher<C> {
    pub fn new(gateway: Arc<Gateway<C>>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<Gateway<C>> {
        &self.gateway
    }
}

impl<C> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl<C> Service<Request<Body>> for Dispatcher<C>
where
    C: Service<ForwardRequest, Response = Response<Bytes>, Error = UpstreamError>
        + Clone
        + Send
        + Sync
        + 'static,
    C::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let gateway = Arc::clone(&self.gateway);
        Box::pin(async move { Ok(gateway.handle(req).await) })
    }
}

/// Callers are told apart by a hash of their credentials.
fn caller_id(headers: &HeaderMap) -> Option<CallerId> {
    let credentials = headers.get(AUTHORIZATION)?;
    let mut hasher = DefaultHasher::new();
    credentials.as_bytes().hash(&mut hasher);
    Some(CallerId(format!("{:016x}", hasher.finish())))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with("multipart/"))
}

fn passthrough(response: Response<Bytes>) -> Response<Bytes> {
    let (mut parts, body) = response.into_parts();
    for name in HOP_BY_HOP {
        parts.headers.remove(name);
    }
    Response::from_parts(parts, body)
}

fn finish(
    mut response: Response<Bytes>,
    request_id: &HeaderValue,
    limit: Option<RateLimitInfo>,
    method: &http::Method,
    target: &str,
    started: Instant,
) -> Response<Body> {
    let headers = response.headers_mut();
    headers
        .entry(ACCESS_CONTROL_ALLOW_ORIGIN)
        .or_insert(HeaderValue::from_static("*"));
    headers.insert(X_REQUEST_ID, request_id.clone());
    if let Some(info) = limit {
        if !headers.contains_key(RATELIMIT_LIMIT) {
            info.apply(headers);
        }
    }

    let elapsed = started.elapsed();
    let status = response.status();

    #[cfg(feature = "metrics")]
    {
        metrics::counter!(
            "gateway_requests_total",
            "method" => method.to_string(),
            "status" => status.as_u16().to_string()
        )
        .increment(1);
        metrics::histogram!("gateway_request_duration_seconds", "method" => method.to_string())
            .record(elapsed.as_secs_f64());
    }

    tracing::info!(
        "{} {} -> {} ({}ms)",
        method,
        target,
        status.as_u16(),
        elapsed.as_millis()
    );

    response.map(Body::from)
}
