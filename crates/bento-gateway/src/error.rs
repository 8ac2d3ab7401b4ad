//! Errors the gateway answers itself, and their JSON envelope.

use crate::upstream::UpstreamError;
use axum::response::IntoResponse;
use bento_ratelimiter::{RateCategory, RateLimiterError};
use bento_resilience::core::ResilienceError;
use bento_router::RouteError;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use http::{Response, StatusCode};
use serde::Serialize;
use std::time::Duration;

/// Names the downstream service on gateway-originated failures.
pub const X_SERVED_BY: HeaderName = HeaderName::from_static("x-served-by");

/// A request the gateway could not hand to a downstream service, or whose
/// downstream call failed before producing a response.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("No route found for path: {path}")]
    RouteNotFound { path: String },

    #[error("Service {service} is not configured")]
    ServiceNotConfigured { service: String },

    /// The service could not be reached or its breaker is open.
    #[error("Service unavailable")]
    BadGateway { service: String, reason: String },

    #[error("Service {service} did not respond in time")]
    Timeout { service: String },

    /// `category` and `limit` are known only when the edge limiter
    /// rejected the request.
    #[error("{}", rate_limit_message(.category))]
    RateLimited {
        category: Option<RateCategory>,
        limit: Option<u32>,
        retry_after: Duration,
    },

    #[error("Service {service} is at capacity, please try again later.")]
    BulkheadRejected { service: String },

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("{0}")]
    BadRequest(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    status_code: u16,
    message: String,
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    service: Option<&'a str>,
}

impl GatewayError {
    /// Maps a failed resilient call on `service`.
    ///
    /// Upstream status failures are not errors at this level; the dispatcher
    /// passes them through before getting here.
    pub fn from_resilience(service: &str, err: ResilienceError<UpstreamError>) -> Self {
        let service = service.to_string();
        match err {
            ResilienceError::Timeout { .. } => GatewayError::Timeout { service },
            ResilienceError::CircuitOpen { name } => GatewayError::BadGateway {
                service,
                reason: match name {
                    Some(name) => format!("circuit breaker {} is open", name),
                    None => "circuit breaker is open".to_string(),
                },
            },
            ResilienceError::BulkheadFull { .. } | ResilienceError::BulkheadRejected { .. } => {
                GatewayError::BulkheadRejected { service }
            }
            ResilienceError::RateLimited { retry_after } => GatewayError::RateLimited {
                category: None,
                limit: None,
                retry_after: retry_after.unwrap_or_default(),
            },
            ResilienceError::Application(err) => GatewayError::BadGateway {
                service,
                reason: err.to_string(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::ServiceNotConfigured { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::BulkheadRejected { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// The `error` field of the envelope.
    pub fn label(&self) -> &'static str {
        self.status().canonical_reason().unwrap_or("Error")
    }

    /// The downstream service involved, if any.
    pub fn service(&self) -> Option<&str> {
        match self {
            GatewayError::ServiceNotConfigured { service }
            | GatewayError::BadGateway { service, .. }
            | GatewayError::Timeout { service }
            | GatewayError::BulkheadRejected { service } => Some(service),
            _ => None,
        }
    }

    /// `{statusCode, message, error}` JSON, plus `service` on 502s.
    pub fn to_response(&self) -> Response<Bytes> {
        let status = self.status();
        let envelope = Envelope {
            status_code: status.as_u16(),
            message: self.to_string(),
            error: self.label(),
            service: match self {
                GatewayError::BadGateway { service, .. } => Some(service),
                _ => None,
            },
        };
        let body = serde_json::to_vec(&envelope).unwrap_or_default();

        let mut response = Response::new(Bytes::from(body));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(service) = self.service() {
            if let Ok(value) = HeaderValue::from_str(service) {
                response.headers_mut().insert(X_SERVED_BY, value);
            }
        }
        if let GatewayError::RateLimited {
            category,
            limit,
            retry_after,
        } = self
        {
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            let headers = response.headers_mut();
            headers.insert(RETRY_AFTER, HeaderValue::from(secs));
            if let (Some(category), Some(limit)) = (category, limit) {
                bento_ratelimiter::RateLimitInfo {
                    category: *category,
                    limit: *limit,
                    remaining: 0,
                    reset: *retry_after,
                }
                .apply(headers);
            }
        }
        response
    }
}

fn rate_limit_message(category: &Option<RateCategory>) -> &'static str {
    category.unwrap_or(RateCategory::General).message()
}

impl From<RouteError> for GatewayError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::RouteNotFound { path } => GatewayError::RouteNotFound { path },
            RouteError::ServiceNotConfigured { service } => {
                GatewayError::ServiceNotConfigured { service }
            }
        }
    }
}

impl From<RateLimiterError> for GatewayError {
    fn from(err: RateLimiterError) -> Self {
        match err {
            RateLimiterError::LimitExceeded {
                category,
                limit,
                reset,
            } => GatewayError::RateLimited {
                category: Some(category),
                limit: Some(limit),
                retry_after: reset,
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        self.to_response().map(axum::body::Body::from)
    }
}
