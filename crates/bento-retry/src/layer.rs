use crate::{Retry, RetryConfig};
use std::sync::Arc;
use tower::Layer;

/// A Tower [`Layer`] that applies retry logic to a service.
///
/// ```
/// use bento_retry::RetryLayer;
/// use std::time::Duration;
/// use tower::ServiceBuilder;
///
/// # #[derive(Debug, Clone)]
/// # struct Unreachable;
/// let retry = RetryLayer::<Unreachable>::builder()
///     .name("comments")
///     .retries(3)
///     .min_delay(Duration::from_millis(200))
///     .max_delay(Duration::from_secs(2))
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(retry)
///     .service(tower::service_fn(|req: String| async move { Ok::<_, Unreachable>(req) }));
/// ```
pub struct RetryLayer<E> {
    config: Arc<RetryConfig<E>>,
}

impl<E> RetryLayer<E> {
    /// Creates a new `RetryLayer` with the given configuration.
    pub fn new(config: RetryConfig<E>) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Creates a new builder for configuring a retry layer.
    pub fn builder() -> crate::RetryConfigBuilder<E> {
        crate::RetryConfigBuilder::new()
    }

    /// The layer's configuration.
    pub fn config(&self) -> &RetryConfig<E> {
        &self.config
    }
}

impl<E> Clone for RetryLayer<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, E> Layer<S> for RetryLayer<E> {
    type Service = Retry<S, E>;

    fn layer(&self, service: S) -> Self::Service {
        Retry::new(service, Arc::clone(&self.config))
    }
}
