//! Property tests for the rate limiter.
//!
//! Invariants tested:
//! - Exactly min(requests, limit) requests are admitted per window
//! - Remaining counts down by one per admitted request
//! - Clients never share a window

use bento_ratelimiter::{RateCategory, RateLimiterLayer};
use http::Request;
use proptest::prelude::*;
use std::time::Duration;

fn from(client: &str) -> Request<()> {
    Request::get("/v1/posts")
        .header("x-forwarded-for", client)
        .body(())
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: a window admits at most its limit
    #[test]
    fn admits_up_to_the_limit(limit in 1u32..=50, requests in 1u32..=120) {
        let limiter = RateLimiterLayer::builder()
            .limit(RateCategory::General, limit, Duration::from_secs(3600))
            .build();

        let mut admitted = 0;
        for n in 0..requests {
            match limiter.check(&from("203.0.113.7")) {
                Ok(Some(info)) => {
                    prop_assert_eq!(info.remaining, limit - n - 1);
                    admitted += 1;
                }
                Ok(None) => prop_assert!(false, "general path is not exempt"),
                Err(err) => prop_assert_eq!(err.category(), RateCategory::General),
            }
        }

        prop_assert_eq!(admitted, requests.min(limit));
    }

    /// Property: one client's traffic never spends another's budget
    #[test]
    fn clients_are_isolated(limit in 1u32..=10, clients in 2usize..=8) {
        let limiter = RateLimiterLayer::builder()
            .limit(RateCategory::General, limit, Duration::from_secs(3600))
            .build();

        for _ in 0..limit {
            prop_assert!(limiter.check(&from("198.51.100.1")).is_ok());
        }
        prop_assert!(limiter.check(&from("198.51.100.1")).is_err());

        for n in 2..=clients {
            let client = format!("198.51.100.{}", n);
            prop_assert!(limiter.check(&from(&client)).is_ok());
        }
        prop_assert_eq!(limiter.tracked_clients(), clients);
    }
}
