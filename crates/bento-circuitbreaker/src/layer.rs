use crate::circuit::{Circuit, CircuitState, CircuitStats};
use crate::classifier::DefaultClassifier;
use crate::config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
use crate::{CircuitBreaker, Shared};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tower::Layer;

/// A Tower Layer that applies a named circuit breaker to inner services.
///
/// The layer owns the circuit: every service it wraps, and every clone of
/// the layer, reads and updates the same state. Registries hand out clones
/// of one layer per name so that all callers of a downstream share a breaker.
///
/// ```rust
/// use bento_circuitbreaker::{CircuitBreakerLayer, CircuitState};
/// use tower::{service_fn, ServiceBuilder};
///
/// let layer = CircuitBreakerLayer::builder()
///     .name("posts-cb")
///     .volume_threshold(5)
///     .build();
///
/// let _svc = ServiceBuilder::new()
///     .layer(layer.clone())
///     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
///
/// assert_eq!(layer.state_sync(), CircuitState::Closed);
/// ```
pub struct CircuitBreakerLayer<C = DefaultClassifier> {
    shared: Arc<Shared>,
    classifier: Arc<C>,
}

impl CircuitBreakerLayer<DefaultClassifier> {
    /// Creates a new builder for configuring a circuit breaker layer.
    pub fn builder() -> CircuitBreakerConfigBuilder<DefaultClassifier> {
        CircuitBreakerConfigBuilder::new()
    }
}

impl<C> CircuitBreakerLayer<C> {
    pub(crate) fn new(config: CircuitBreakerConfig, classifier: C) -> Self {
        let state = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let circuit = Circuit::new(Arc::clone(&state));
        Self {
            shared: Arc::new(Shared {
                config,
                circuit: Mutex::new(circuit),
                state,
            }),
            classifier: Arc::new(classifier),
        }
    }

    /// Returns a layer with a different classifier that drives the same circuit.
    pub fn with_classifier<C2>(&self, classifier: C2) -> CircuitBreakerLayer<C2> {
        CircuitBreakerLayer {
            shared: Arc::clone(&self.shared),
            classifier: Arc::new(classifier),
        }
    }

    /// Wraps `service`, giving direct access to the [`CircuitBreaker`] (for
    /// [`CircuitBreaker::with_fallback`]).
    pub fn layer_fn<S>(&self, service: S) -> CircuitBreaker<S, C> {
        CircuitBreaker::new(service, Arc::clone(&self.shared), Arc::clone(&self.classifier))
    }

    /// The breaker's configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.shared.config
    }

    /// The breaker's name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Current state without taking the lock.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// True while the circuit is open.
    pub fn is_open(&self) -> bool {
        self.state_sync() == CircuitState::Open
    }

    /// Snapshot of the rolling window.
    pub fn stats(&self) -> CircuitStats {
        let config = &self.shared.config;
        self.shared.lock().stats(config)
    }

    /// Opens the circuit until the reset timeout elapses.
    pub fn force_open(&self) {
        let config = &self.shared.config;
        self.shared.lock().force_open(config);
    }

    /// Closes the circuit and clears the window.
    pub fn force_closed(&self) {
        let config = &self.shared.config;
        self.shared.lock().force_closed(config);
    }

    /// Returns to Closed with an empty window without emitting a transition.
    pub fn reset(&self) {
        self.shared.lock().reset();
    }
}

impl<C> Clone for CircuitBreakerLayer<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<C> std::fmt::Debug for CircuitBreakerLayer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerLayer")
            .field("name", &self.name())
            .field("state", &self.state_sync())
            .finish()
    }
}

impl<S, C> Layer<S> for CircuitBreakerLayer<C> {
    type Service = CircuitBreaker<S, C>;

    fn layer(&self, service: S) -> Self::Service {
        self.layer_fn(service)
    }
}
