//! Outcome classification for circuit breaker decisions.
//!
//! A [`FailureClassifier`] decides how a finished call is recorded in the
//! rolling window: as a success, a failure, or a timeout (which also counts
//! toward the failure rate).

use bento_resilience_core::{Classify, FailureKind};
use std::sync::Arc;

/// How a finished call is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// Counts toward volume only.
    Success,
    /// Counts toward volume and failure rate.
    Failure,
    /// Counts toward volume and failure rate, reported separately in stats.
    Timeout,
}

impl CallOutcome {
    /// True for `Failure` and `Timeout`.
    pub fn is_failure(self) -> bool {
        !matches!(self, CallOutcome::Success)
    }
}

/// Decides how a `Result<Res, Err>` is recorded by the breaker.
pub trait FailureClassifier<Res, Err>: Send + Sync {
    /// Classifies a finished call.
    fn classify(&self, result: &Result<Res, Err>) -> CallOutcome;
}

/// Counts every error as a failure.
///
/// ```rust
/// use bento_circuitbreaker::classifier::{CallOutcome, DefaultClassifier, FailureClassifier};
///
/// let classifier = DefaultClassifier;
/// assert_eq!(
///     FailureClassifier::<u16, String>::classify(&classifier, &Err("refused".into())),
///     CallOutcome::Failure
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<Res, Err> FailureClassifier<Res, Err> for DefaultClassifier {
    fn classify(&self, result: &Result<Res, Err>) -> CallOutcome {
        match result {
            Ok(_) => CallOutcome::Success,
            Err(_) => CallOutcome::Failure,
        }
    }
}

/// Classifies errors through [`Classify`].
///
/// Timeouts are recorded as timeouts. Client errors (4xx except 429) mean
/// the downstream answered correctly, so they are recorded as successes and
/// never trip the breaker. Everything else is a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct KindClassifier;

impl<Res, Err> FailureClassifier<Res, Err> for KindClassifier
where
    Err: Classify,
{
    fn classify(&self, result: &Result<Res, Err>) -> CallOutcome {
        let Err(err) = result else {
            return CallOutcome::Success;
        };
        match err.failure_kind() {
            FailureKind::Timeout => CallOutcome::Timeout,
            kind if kind.is_client_error() => CallOutcome::Success,
            _ => CallOutcome::Failure,
        }
    }
}

/// A classifier backed by a closure returning `true` for failures.
///
/// ```rust
/// use bento_circuitbreaker::classifier::{CallOutcome, FailureClassifier, FnClassifier};
///
/// let classifier = FnClassifier::new(|result: &Result<u16, ()>| match result {
///     Ok(status) => *status >= 500,
///     Err(_) => true,
/// });
///
/// assert_eq!(classifier.classify(&Ok(200)), CallOutcome::Success);
/// assert_eq!(classifier.classify(&Ok(503)), CallOutcome::Failure);
/// ```
#[derive(Clone)]
pub struct FnClassifier<F> {
    f: Arc<F>,
}

impl<F> FnClassifier<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F, Res, Err> FailureClassifier<Res, Err> for FnClassifier<F>
where
    F: Fn(&Result<Res, Err>) -> bool + Send + Sync,
{
    fn classify(&self, result: &Result<Res, Err>) -> CallOutcome {
        if (self.f)(result) {
            CallOutcome::Failure
        } else {
            CallOutcome::Success
        }
    }
}

impl<F> std::fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClassifier")
            .field("f", &"<closure>")
            .finish()
    }
}
