//! Property-based tests for routing, rate limiting and the resilience
//! patterns.
//!
//! Run with: cargo test --test property_tests

pub mod backoff;
pub mod bulkhead;
pub mod rate_limiter;
pub mod router;
