//! Property tests for retry backoff schedules.
//!
//! Invariants tested:
//! - No delay ever exceeds the cap, jitter included
//! - Without jitter the schedule never shrinks
//! - Jittered delays stay within [base, 2 × base)

use bento_retry::{ExponentialBackoff, ExponentialRandomBackoff, IntervalFunction};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: the cap holds for every attempt
    #[test]
    fn delays_never_exceed_the_cap(
        min_ms in 1u64..=2_000,
        cap_ms in 1u64..=20_000,
        factor in 1.0f64..=4.0,
        attempt in 0usize..=64,
    ) {
        let cap = Duration::from_millis(cap_ms);
        let plain = ExponentialBackoff::new(Duration::from_millis(min_ms))
            .multiplier(factor)
            .max_interval(cap);
        let jittered = ExponentialRandomBackoff::new(Duration::from_millis(min_ms))
            .multiplier(factor)
            .max_interval(cap);

        prop_assert!(plain.next_interval(attempt) <= cap);
        prop_assert!(jittered.next_interval(attempt) <= cap);
    }

    /// Property: without jitter each delay is at least the one before
    #[test]
    fn schedule_is_monotone_without_jitter(
        min_ms in 1u64..=2_000,
        cap_ms in 1u64..=60_000,
        factor in 1.0f64..=4.0,
    ) {
        let backoff = ExponentialBackoff::new(Duration::from_millis(min_ms))
            .multiplier(factor)
            .max_interval(Duration::from_millis(cap_ms));

        let delays: Vec<_> = (0..16).map(|n| backoff.next_interval(n)).collect();
        for pair in delays.windows(2) {
            prop_assert!(pair[0] <= pair[1], "{:?} then {:?}", pair[0], pair[1]);
        }
    }

    /// Property: uncapped jitter scales the base delay by [1, 2)
    #[test]
    fn jitter_stays_within_twice_the_base(
        min_ms in 1u64..=1_000,
        attempt in 0usize..=6,
    ) {
        let base = ExponentialBackoff::new(Duration::from_millis(min_ms)).next_interval(attempt);
        let delay = ExponentialRandomBackoff::new(Duration::from_millis(min_ms)).next_interval(attempt);

        prop_assert!(delay >= base);
        prop_assert!(delay < base * 2);
    }
}
