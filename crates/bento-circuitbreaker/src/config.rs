use crate::circuit::CircuitState;
use crate::classifier::{DefaultClassifier, FnClassifier, KindClassifier};
use crate::events::CircuitBreakerEvent;
use crate::layer::CircuitBreakerLayer;
use bento_resilience_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for one named circuit breaker.
pub struct CircuitBreakerConfig {
    pub(crate) error_threshold_percentage: f64,
    pub(crate) volume_threshold: usize,
    pub(crate) reset_timeout: Duration,
    pub(crate) rolling_window: Duration,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    /// Name of the breaker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Failure percentage (0..=100) at which the circuit opens.
    pub fn error_threshold_percentage(&self) -> f64 {
        self.error_threshold_percentage
    }

    /// Calls required in the window before the failure rate is evaluated.
    pub fn volume_threshold(&self) -> usize {
        self.volume_threshold
    }

    /// How long the circuit stays open before admitting a trial call.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Length of the rolling observation window.
    pub fn rolling_window(&self) -> Duration {
        self.rolling_window
    }
}

/// Builder for a [`CircuitBreakerLayer`].
///
/// `C` is the failure classifier; it changes when
/// [`failure_classifier`](Self::failure_classifier) or
/// [`classify_errors`](Self::classify_errors) is called.
pub struct CircuitBreakerConfigBuilder<C = DefaultClassifier> {
    error_threshold_percentage: f64,
    volume_threshold: usize,
    reset_timeout: Duration,
    rolling_window: Duration,
    classifier: C,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerConfigBuilder<DefaultClassifier> {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            error_threshold_percentage: 50.0,
            volume_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            rolling_window: Duration::from_secs(10),
            classifier: DefaultClassifier,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }
}

impl Default for CircuitBreakerConfigBuilder<DefaultClassifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CircuitBreakerConfigBuilder<C> {
    /// Sets the failure percentage at which the circuit opens.
    ///
    /// Values are clamped to `0.0..=100.0`.
    ///
    /// Default: 50
    pub fn error_threshold_percentage(mut self, percentage: f64) -> Self {
        self.error_threshold_percentage = percentage.clamp(0.0, 100.0);
        self
    }

    /// Sets how many calls the rolling window must hold before the failure
    /// rate can open the circuit.
    ///
    /// Default: 5
    pub fn volume_threshold(mut self, calls: usize) -> Self {
        self.volume_threshold = calls;
        self
    }

    /// Sets how long the circuit stays open before admitting one trial call.
    ///
    /// Default: 30 seconds
    pub fn reset_timeout(mut self, duration: Duration) -> Self {
        self.reset_timeout = duration;
        self
    }

    /// Sets the length of the rolling observation window.
    ///
    /// Default: 10 seconds
    pub fn rolling_window(mut self, duration: Duration) -> Self {
        self.rolling_window = duration;
        self
    }

    /// Give this breaker a human readable name used in errors, events,
    /// logs and metrics.
    ///
    /// Default: `<unnamed>`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Classifies results with a closure returning `true` for failures.
    ///
    /// Default: every error is a failure
    pub fn failure_classifier<F, Res, Err>(self, f: F) -> CircuitBreakerConfigBuilder<FnClassifier<F>>
    where
        F: Fn(&Result<Res, Err>) -> bool + Send + Sync + 'static,
    {
        self.with_classifier(FnClassifier::new(f))
    }

    /// Classifies results through [`bento_resilience_core::Classify`]:
    /// timeouts are tracked separately and client errors never trip the
    /// breaker.
    pub fn classify_errors(self) -> CircuitBreakerConfigBuilder<KindClassifier> {
        self.with_classifier(KindClassifier)
    }

    fn with_classifier<C2>(self, classifier: C2) -> CircuitBreakerConfigBuilder<C2> {
        CircuitBreakerConfigBuilder {
            error_threshold_percentage: self.error_threshold_percentage,
            volume_threshold: self.volume_threshold,
            reset_timeout: self.reset_timeout,
            rolling_window: self.rolling_window,
            classifier,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Registers a callback for state transitions.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        }));
        self
    }

    /// Registers a callback when a call is permitted, with the state it was
    /// permitted in.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                f(*state);
            }
        }));
        self
    }

    /// Registers a callback when a call is rejected.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::CallRejected { .. } = event {
                f();
            }
        }));
        self
    }

    /// Registers a callback when a success is recorded.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                f(*state);
            }
        }));
        self
    }

    /// Registers a callback when a failure is recorded.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                f(*state);
            }
        }));
        self
    }

    /// Builds the layer. Every service produced by it shares one circuit.
    pub fn build(self) -> CircuitBreakerLayer<C> {
        let config = CircuitBreakerConfig {
            error_threshold_percentage: self.error_threshold_percentage,
            volume_threshold: self.volume_threshold,
            reset_timeout: self.reset_timeout,
            rolling_window: self.rolling_window,
            event_listeners: self.event_listeners,
            name: self.name,
        };
        CircuitBreakerLayer::new(config, self.classifier)
    }
}
