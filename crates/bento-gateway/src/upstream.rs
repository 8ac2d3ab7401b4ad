//! Calls to downstream services.

use axum::body::Body;
use bento_resilience_core::{Classify, FailureKind};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{HeaderName, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, Method, Request, Response, Uri};
use http_body_util::BodyExt;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tower::Service;

/// Request headers copied to the downstream call. Everything else stays at
/// the edge.
pub const FORWARDED_HEADERS: [HeaderName; 6] = [
    AUTHORIZATION,
    CONTENT_TYPE,
    ACCEPT,
    USER_AGENT,
    HeaderName::from_static("x-request-id"),
    HeaderName::from_static("x-correlation-id"),
];

/// Body of a forwarded request.
#[derive(Clone)]
pub enum ForwardBody {
    /// Fully read; may be sent any number of times.
    Buffered(Bytes),
    /// Streamed through once, then gone.
    Streaming(Arc<Mutex<Option<Body>>>),
}

impl ForwardBody {
    pub fn streaming(body: Body) -> Self {
        ForwardBody::Streaming(Arc::new(Mutex::new(Some(body))))
    }

    /// True when the body can be sent again on retry.
    pub fn is_replayable(&self) -> bool {
        matches!(self, ForwardBody::Buffered(_))
    }

    /// A body ready to send. A streaming body can be taken only once.
    pub fn take(&self) -> Result<Body, UpstreamError> {
        match self {
            ForwardBody::Buffered(bytes) => Ok(Body::from(bytes.clone())),
            ForwardBody::Streaming(slot) => slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .ok_or(UpstreamError::BodyConsumed),
        }
    }
}

impl Default for ForwardBody {
    fn default() -> Self {
        ForwardBody::Buffered(Bytes::new())
    }
}

impl fmt::Debug for ForwardBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardBody::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
            ForwardBody::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

/// A request on its way to a downstream service.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Absolute URL, query string included.
    pub url: String,
    pub headers: HeaderMap,
    pub body: ForwardBody,
}

impl ForwardRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: ForwardBody::default(),
        }
    }

    /// Copies the [`FORWARDED_HEADERS`] present in `source`.
    pub fn forward_headers(mut self, source: &HeaderMap) -> Self {
        for name in FORWARDED_HEADERS.iter() {
            for value in source.get_all(name) {
                self.headers.append(name.clone(), value.clone());
            }
        }
        self
    }

    pub fn body(mut self, body: ForwardBody) -> Self {
        self.body = body;
        self
    }
}

/// Why a downstream call failed.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid upstream url {url}")]
    InvalidUrl { url: String },

    #[error("upstream unreachable: {reason}")]
    Connect { reason: String },

    #[error("failed to read upstream response: {reason}")]
    Body { reason: String },

    #[error("request body was already sent")]
    BodyConsumed,

    /// The service answered with a 5xx. The response is kept so it can be
    /// passed through once retries are exhausted.
    #[error("upstream responded with {}", .response.status())]
    Status { response: Response<Bytes> },
}

impl Classify for UpstreamError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            UpstreamError::Connect { .. } | UpstreamError::Body { .. } => FailureKind::Network,
            UpstreamError::Status { response } => FailureKind::Status(response.status().as_u16()),
            UpstreamError::InvalidUrl { .. } | UpstreamError::BodyConsumed => FailureKind::Other,
        }
    }
}

/// Pooled HTTP/1 client for downstream services.
///
/// Responses are read fully into memory. A 5xx answer is returned as
/// [`UpstreamError::Status`] so retries and breakers see it as a failure;
/// any other status is a success.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client<HttpConnector, Body>,
}

impl HttpClient {
    pub fn new() -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        Self {
            inner: Client::builder(TokioExecutor::new()).build(connector),
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

impl Service<ForwardRequest> for HttpClient {
    type Response = Response<Bytes>;
    type Error = UpstreamError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ForwardRequest) -> Self::Future {
        let client = self.inner.clone();

        Box::pin(async move {
            let uri: Uri = req
                .url
                .parse()
                .map_err(|_| UpstreamError::InvalidUrl { url: req.url.clone() })?;

            let mut request = Request::builder()
                .method(req.method.clone())
                .uri(uri)
                .body(req.body.take()?)
                .map_err(|_| UpstreamError::InvalidUrl { url: req.url.clone() })?;
            *request.headers_mut() = req.headers;

            let response = client
                .request(request)
                .await
                .map_err(|e| UpstreamError::Connect {
                    reason: e.to_string(),
                })?;

            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| UpstreamError::Body {
                    reason: e.to_string(),
                })?
                .to_bytes();
            let response = Response::from_parts(parts, body);

            if response.status().is_server_error() {
                return Err(UpstreamError::Status { response });
            }
            Ok(response)
        })
    }
}
