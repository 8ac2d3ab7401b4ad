//! Core infrastructure shared by the bento gateway resilience crates.
//!
//! - [`events`]: observable events emitted by every pattern
//! - [`error`]: [`ResilienceError`], the error every composed stack converges on
//! - [`classify`]: how downstream failures are bucketed for retry and breaker decisions

pub mod classify;
pub mod error;
pub mod events;

pub use classify::{Classify, FailureKind};
pub use error::{RejectReason, ResilienceError};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
