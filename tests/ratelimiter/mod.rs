//! Per-client rate limiting at the edge.
//!
//! Test organization:
//! - categories.rs: the gateway's default limits per request category
//! - stacking.rs: the limiter in front of a resilient call path

mod stacking;

use http::Request;

/// A GET for `path` from `client`.
pub fn from(client: &str, path: &str) -> Request<()> {
    Request::get(path)
        .header("x-forwarded-for", client)
        .body(())
        .unwrap()
}
