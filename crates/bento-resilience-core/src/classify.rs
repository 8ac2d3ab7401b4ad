//! Failure classification.
//!
//! Retry and circuit-breaker decisions depend on *what kind* of failure
//! happened rather than on the concrete error type. Errors that implement
//! [`Classify`] report a [`FailureKind`]; the retry crate uses it to decide
//! whether to bail, the gateway uses it to keep client errors from tripping
//! breakers.

/// Coarse class of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused, reset, DNS failure and similar transport errors.
    Network,
    /// The call did not finish in time.
    Timeout,
    /// The downstream answered with a non-success HTTP status.
    Status(u16),
    /// Anything else.
    Other,
}

impl FailureKind {
    /// Network errors, timeouts, 5xx and 429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureKind::Network | FailureKind::Timeout => true,
            FailureKind::Status(code) => *code >= 500 || *code == 429,
            FailureKind::Other => false,
        }
    }

    /// 4xx other than 429: the request itself is wrong and repeating it cannot help.
    pub fn is_client_error(&self) -> bool {
        matches!(self, FailureKind::Status(code) if (400..500).contains(code) && *code != 429)
    }
}

/// Errors that can describe their [`FailureKind`].
pub trait Classify {
    /// Returns the class of this failure.
    fn failure_kind(&self) -> FailureKind;
}
