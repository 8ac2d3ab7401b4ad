//! Liveness, readiness and downstream health.

use crate::dispatch::Gateway;
use crate::upstream::{ForwardRequest, UpstreamError};
use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use http::{Method, Response};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{Service, ServiceExt};

/// How long a downstream `/health` probe may take.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the gateway started.
    pub uptime: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    /// `up` or `down`.
    pub status: &'static str,
    /// Probe round trip in milliseconds.
    pub latency: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceHealth {
    pub fn is_up(&self) -> bool {
        self.status == "up"
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerHealth {
    pub name: String,
    pub state: &'static str,
    pub failure_rate: f64,
    pub volume: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkheadHealth {
    pub name: String,
    pub active: usize,
    pub queued: usize,
    pub max_concurrent: usize,
    pub total_rejected: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesReport {
    /// `healthy` when every service is up, `unhealthy` when none is,
    /// `degraded` otherwise.
    pub status: &'static str,
    pub timestamp: String,
    /// Keyed by lowercase service id.
    pub services: BTreeMap<String, ServiceHealth>,
    pub circuit_breakers: Vec<BreakerHealth>,
    pub bulkheads: Vec<BulkheadHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ready {
    pub ready: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Live {
    pub live: bool,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Overall status from individual probes.
pub fn overall_status<'a>(probes: impl IntoIterator<Item = &'a ServiceHealth>) -> &'static str {
    let (mut up, mut down) = (0usize, 0usize);
    for probe in probes {
        if probe.is_up() {
            up += 1;
        } else {
            down += 1;
        }
    }
    match (up, down) {
        (_, 0) => "healthy",
        (0, _) => "unhealthy",
        _ => "degraded",
    }
}

/// `GET {url}/health` through `client`, bounded by [`PROBE_TIMEOUT`].
///
/// A 2xx answer is `up`; any other status, a transport error or the
/// timeout is `down`.
pub async fn probe<C>(client: C, url: &str) -> ServiceHealth
where
    C: Service<ForwardRequest, Response = Response<Bytes>, Error = UpstreamError>,
{
    let started = Instant::now();
    let request = ForwardRequest::new(Method::GET, format!("{}/health", url.trim_end_matches('/')));
    let outcome = tokio::time::timeout(PROBE_TIMEOUT, client.oneshot(request)).await;
    let latency = started.elapsed().as_millis() as u64;

    let error = match outcome {
        Ok(Ok(response)) if response.status().is_success() => None,
        Ok(Ok(response)) => Some(format!("HTTP {}", response.status().as_u16())),
        Ok(Err(UpstreamError::Status { response })) => {
            Some(format!("HTTP {}", response.status().as_u16()))
        }
        Ok(Err(err)) => Some(err.to_string()),
        Err(_) => Some(format!("timeout of {}ms exceeded", PROBE_TIMEOUT.as_millis())),
    };

    match error {
        None => ServiceHealth {
            status: "up",
            latency,
            error: None,
        },
        Some(error) => {
            tracing::warn!(url, %error, "health check failed");
            ServiceHealth {
                status: "down",
                latency,
                error: Some(error),
            }
        }
    }
}

pub async fn health<C>(State(gateway): State<Arc<Gateway<C>>>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        timestamp: now(),
        uptime: gateway.uptime().as_secs(),
    })
}

/// Probes every configured service concurrently.
pub async fn services<C>(State(gateway): State<Arc<Gateway<C>>>) -> Json<ServicesReport>
where
    C: Service<ForwardRequest, Response = Response<Bytes>, Error = UpstreamError>
        + Clone
        + Send
        + Sync
        + 'static,
    C::Future: Send + 'static,
{
    let probes = gateway.services().iter().map(|(name, url)| {
        let client = gateway.client.clone();
        async move { (name.to_lowercase(), probe(client, url).await) }
    });
    let services: BTreeMap<_, _> = futures::future::join_all(probes).await.into_iter().collect();

    let registry = gateway.registry();
    let circuit_breakers = registry
        .breaker_stats()
        .into_iter()
        .map(|stats| BreakerHealth {
            volume: stats.volume(),
            name: stats.name,
            state: stats.state.as_str(),
            failure_rate: stats.failure_rate,
        })
        .collect();
    let bulkheads = registry
        .bulkhead_stats()
        .into_iter()
        .map(|stats| BulkheadHealth {
            name: stats.name,
            active: stats.active,
            queued: stats.queued,
            max_concurrent: stats.max_concurrent,
            total_rejected: stats.total_rejected,
        })
        .collect();

    Json(ServicesReport {
        status: overall_status(services.values()),
        timestamp: now(),
        services,
        circuit_breakers,
        bulkheads,
    })
}

pub async fn ready() -> Json<Ready> {
    Json(Ready { ready: true })
}

pub async fn live() -> Json<Live> {
    Json(Live { live: true })
}
