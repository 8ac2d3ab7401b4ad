//! Resilience composer for the Bento gateway.
//!
//! Every downstream call goes through the same stack, outermost first:
//!
//! ```text
//! bulkhead → circuit breaker → retry → timeout → call
//! ```
//!
//! The breaker and bulkhead for a name live in a [`ResilienceRegistry`]
//! built once at startup, so every composition for `"users"` shares the
//! `"users-cb"` breaker and the `"users-bh"` bulkhead. Retry and timeout
//! layers carry no shared state and are rebuilt per composition.
//!
//! ```rust
//! use bento_resilience::{BulkheadOptions, ResilienceOptions, ResilienceRegistry};
//! use bento_resilience_core::{Classify, FailureKind};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower::service_fn;
//!
//! #[derive(Debug)]
//! struct Upstream(u16);
//!
//! impl Classify for Upstream {
//!     fn failure_kind(&self) -> FailureKind {
//!         FailureKind::Status(self.0)
//!     }
//! }
//!
//! let registry = Arc::new(ResilienceRegistry::new());
//!
//! let options = ResilienceOptions::default()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_bulkhead(BulkheadOptions::default());
//!
//! let uploads = registry.compose(
//!     "media",
//!     &options,
//!     service_fn(|bytes: Vec<u8>| async move { Ok::<_, Upstream>(bytes.len()) }),
//! );
//! ```
//!
//! The pattern crates are re-exported for use with `tower::ServiceBuilder`.

mod options;
mod registry;

pub use options::{BreakerOptions, BulkheadOptions, ResilienceOptions, RetryOptions};
pub use registry::{Fallback, ResilienceRegistry, ResilientService};

pub use bento_bulkhead as bulkhead;
pub use bento_circuitbreaker as circuitbreaker;
pub use bento_resilience_core as core;
pub use bento_retry as retry;
pub use bento_timelimiter as timelimiter;
