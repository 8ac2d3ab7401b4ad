//! HTTP front: health routes, the dispatcher fallback, and the serve loop.

use crate::config::{ConfigError, GatewayConfig};
use crate::dispatch::{Dispatcher, Gateway};
use crate::health;
use crate::upstream::{ForwardRequest, HttpClient, UpstreamError};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use http::Response;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::Service;
use tower_http::trace::TraceLayer;

/// Failures that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// The axum application for `gateway`.
///
/// `/health`, `/health/services`, `/health/ready` and `/health/live` are
/// answered locally; every other request goes to the [`Dispatcher`].
pub fn app<C>(gateway: Arc<Gateway<C>>) -> Router
where
    C: Service<ForwardRequest, Response = Response<Bytes>, Error = UpstreamError>
        + Clone
        + Send
        + Sync
        + 'static,
    C::Future: Send + 'static,
{
    Router::new()
        .route("/health", get(health::health::<C>))
        .route("/health/services", get(health::services::<C>))
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .fallback_service(Dispatcher::new(Arc::clone(&gateway)))
        .with_state(gateway)
        .layer(TraceLayer::new_for_http())
}

/// Builds the gateway from `config` and serves it until Ctrl+C or SIGTERM.
///
/// Background sweepers for the cache and the rate limiter run for the life
/// of the server. On shutdown every bulkhead queue is drained with a
/// rejection.
pub async fn serve(config: GatewayConfig) -> Result<(), ServeError> {
    let addr = config.server.socket_addr()?;
    let gateway = Arc::new(Gateway::from_config(&config, HttpClient::new())?);

    let mut sweepers = Vec::new();
    if let Some(cache) = gateway.cache() {
        sweepers.push(cache.spawn_sweeper());
    }
    if let Some(limiter) = gateway.rate_limiter() {
        sweepers.push(limiter.spawn_sweeper());
    }

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;

    tracing::info!(
        address = %listener.local_addr()?,
        routes = config.routes.len(),
        cache = gateway.cache().is_some(),
        rate_limit = gateway.rate_limiter().is_some(),
        "gateway listening"
    );
    for (service, url) in &config.services {
        tracing::info!(service = %service, url = %url, "downstream service");
    }

    let app = app(Arc::clone(&gateway)).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    gateway.registry().shutdown();
    for sweeper in sweepers {
        sweeper.abort();
    }

    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
