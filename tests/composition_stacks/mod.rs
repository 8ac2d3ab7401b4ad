//! Runtime tests for composed call paths.
//!
//! - `order_verification`: each layer sees what the layers around it let through
//! - `gateway_stacks`: the per-service stacks the gateway builds from its config
//! - `fallback`: degraded answers when the breaker rejects or a call fails

mod gateway_stacks;
mod test_utils;
