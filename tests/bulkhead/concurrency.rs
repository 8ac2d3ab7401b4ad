use super::CallError;
use bento_bulkhead::BulkheadLayer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceExt};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_exceeds_max_concurrent_calls() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let (current, highest) = (Arc::clone(&in_flight), Arc::clone(&peak));
    let service = tower::service_fn(move |_req: usize| {
        let current = Arc::clone(&current);
        let highest = Arc::clone(&highest);
        async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            highest.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            current.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, CallError>(())
        }
    });

    let layer = BulkheadLayer::builder()
        .max_concurrent_calls(5)
        .max_queue(100)
        .build();
    let service = layer.layer(service);

    let handles: Vec<_> = (0..40)
        .map(|i| tokio::spawn(service.clone().oneshot(i)))
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 5);
    let stats = layer.stats();
    assert_eq!(stats.total_executed, 40);
    assert_eq!(stats.total_rejected, 0);
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn queued_calls_run_in_arrival_order() {
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = Arc::clone(&order);
    let service = tower::service_fn(move |id: usize| {
        let seen = Arc::clone(&seen);
        async move {
            tokio::task::yield_now().await;
            seen.lock().unwrap().push(id);
            Ok::<_, CallError>(())
        }
    });

    let layer = BulkheadLayer::builder()
        .max_concurrent_calls(1)
        .max_queue(10)
        .build();
    let service = layer.layer(service);

    let handles: Vec<_> = (0..5)
        .map(|id| tokio::spawn(service.clone().oneshot(id)))
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}
