//! Property tests for the bulkhead pattern.
//!
//! Invariants tested:
//! - Concurrent calls never exceed max_concurrent_calls
//! - Every call either runs or is rejected, and the stats agree

use bento_bulkhead::BulkheadLayer;
use bento_resilience_core::ResilienceError;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tower::{Layer, ServiceExt};

type TestError = ResilienceError<std::io::Error>;

/// Tracks how many calls run at once.
#[derive(Clone, Default)]
struct Tracker {
    current: Arc<AtomicUsize>,
    max_seen: Arc<AtomicUsize>,
}

impl Tracker {
    async fn run(&self, work: Duration) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(work).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: the bulkhead never lets more than its limit run at once
    #[test]
    fn bulkhead_respects_max_concurrent(
        max_concurrent in 1usize..=20,
        num_requests in 1usize..=100,
        work_ms in 1u64..=10,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let tracker = Tracker::default();
            let worker = tracker.clone();
            let layer = BulkheadLayer::builder()
                .max_concurrent_calls(max_concurrent)
                .max_queue(num_requests)
                .queue_timeout(Duration::from_secs(10))
                .build();
            let service = layer.layer(tower::service_fn(move |_: ()| {
                let worker = worker.clone();
                async move {
                    worker.run(Duration::from_millis(work_ms)).await;
                    Ok::<_, TestError>(())
                }
            }));

            let handles: Vec<_> = (0..num_requests)
                .map(|_| tokio::spawn(service.clone().oneshot(())))
                .collect();
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            let observed = tracker.max_seen.load(Ordering::SeqCst);
            prop_assert!(
                observed <= max_concurrent,
                "Observed {} concurrent calls but limit was {}",
                observed,
                max_concurrent
            );
            prop_assert_eq!(layer.stats().total_executed, num_requests as u64);
            Ok(())
        })?;
    }

    /// Property: with a bounded queue, runs plus rejections account for
    /// every call
    #[test]
    fn calls_are_run_or_rejected(
        max_concurrent in 1usize..=5,
        max_queue in 0usize..=5,
        num_requests in 1usize..=30,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let layer = BulkheadLayer::builder()
                .max_concurrent_calls(max_concurrent)
                .max_queue(max_queue)
                .queue_timeout(Duration::from_secs(10))
                .build();
            let service = layer.layer(tower::service_fn(|_: ()| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, TestError>(())
            }));

            let handles: Vec<_> = (0..num_requests)
                .map(|_| tokio::spawn(service.clone().oneshot(())))
                .collect();
            let mut ok = 0u64;
            let mut rejected = 0u64;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(()) => ok += 1,
                    Err(err) => {
                        prop_assert!(err.is_bulkhead_rejected());
                        rejected += 1;
                    }
                }
            }

            let stats = layer.stats();
            prop_assert_eq!(ok + rejected, num_requests as u64);
            prop_assert_eq!(stats.total_executed, ok);
            prop_assert_eq!(stats.total_rejected, rejected);
            prop_assert!(ok >= max_concurrent.min(num_requests) as u64);
            Ok(())
        })?;
    }
}
