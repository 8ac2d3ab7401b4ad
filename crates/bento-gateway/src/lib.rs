//! Edge gateway for the Bento social network.
//!
//! Every public `/v1/*` request passes through the same pipeline:
//!
//! ```text
//! rate limit → response cache → route → bulkhead → breaker → retry → timeout → service
//! ```
//!
//! The pieces live in their own crates ([`bento_ratelimiter`],
//! [`bento_cache`], [`bento_router`], [`bento_resilience`]); this crate
//! wires them to an axum server and a pooled hyper client.
//!
//! - [`config`]: TOML file plus environment overrides
//! - [`dispatch`]: the [`Gateway`] state and its [`Dispatcher`] service
//! - [`health`]: `/health` endpoints, including downstream probes
//! - [`upstream`]: the outbound client and its error classification
//!
//! ## Testing against a mock upstream
//!
//! The dispatcher is generic over its client, so any
//! `Service<ForwardRequest>` can stand in for the network:
//!
//! ```rust
//! use bento_gateway::config::GatewayConfig;
//! use bento_gateway::upstream::{ForwardRequest, UpstreamError};
//! use bento_gateway::{Dispatcher, Gateway};
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use std::sync::Arc;
//! use tower::{service_fn, ServiceExt};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let client = service_fn(|req: ForwardRequest| async move {
//!     assert_eq!(req.url, "http://localhost:3004/topics");
//!     Ok::<_, UpstreamError>(Response::new(Bytes::from_static(b"[]")))
//! });
//!
//! let gateway = Gateway::from_config(&GatewayConfig::default(), client).unwrap();
//! let dispatcher = Dispatcher::new(Arc::new(gateway));
//!
//! let req = Request::get("/v1/topics").body(axum::body::Body::empty()).unwrap();
//! let res = dispatcher.oneshot(req).await.unwrap();
//! assert_eq!(res.status(), 200);
//! assert_eq!(res.headers()["x-cache"], "MISS");
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod routes;
pub mod server;
pub mod upstream;

pub use config::{ConfigError, GatewayConfig};
pub use dispatch::{Dispatcher, Gateway, X_REQUEST_ID};
pub use error::GatewayError;
pub use server::{app, serve, ServeError};
pub use upstream::{ForwardBody, ForwardRequest, HttpClient, UpstreamError};

use std::sync::Once;

static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        #[cfg(feature = "metrics")]
        {
            metrics::describe_counter!(
                "gateway_requests_total",
                "Requests answered by the gateway, by method and status"
            );
            metrics::describe_counter!(
                "gateway_errors_total",
                "Requests the gateway failed itself, by error"
            );
            metrics::describe_histogram!(
                "gateway_request_duration_seconds",
                metrics::Unit::Seconds,
                "Time from request receipt to response"
            );
        }
    });
}
