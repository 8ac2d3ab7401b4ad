use bento_resilience_core::ResilienceError;
use thiserror::Error;

/// Errors raised by the circuit breaker itself.
///
/// Errors from the wrapped service pass through unchanged; the breaker only
/// adds the rejection it produces while open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CircuitBreakerError {
    /// The circuit is open (or a half-open trial is already running).
    #[error("circuit breaker '{name}' is open")]
    OpenCircuit {
        /// Name of the breaker that rejected the call.
        name: String,
    },
}

impl CircuitBreakerError {
    /// Name of the breaker that produced the error.
    pub fn name(&self) -> &str {
        match self {
            CircuitBreakerError::OpenCircuit { name } => name,
        }
    }
}

impl<E> From<CircuitBreakerError> for ResilienceError<E> {
    fn from(err: CircuitBreakerError) -> Self {
        match err {
            CircuitBreakerError::OpenCircuit { name } => {
                ResilienceError::CircuitOpen { name: Some(name) }
            }
        }
    }
}
