//! Tower layer implementation for bulkhead.

use crate::config::BulkheadConfig;
use crate::error::BulkheadError;
use crate::queue::{BulkheadStats, Core};
use crate::service::Bulkhead;
use std::future::Future;
use std::sync::Arc;
use tower::Layer;

#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge, describe_histogram};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// A named bulkhead.
///
/// The layer owns the slots and the wait queue; clones of the layer and every
/// service it wraps share them. Work can also be run directly with
/// [`execute`](Self::execute).
#[derive(Clone)]
pub struct BulkheadLayer {
    core: Arc<Core>,
}

impl BulkheadLayer {
    /// Creates a new bulkhead layer with the given configuration.
    pub fn new(config: BulkheadConfig) -> Self {
        Self {
            core: Arc::new(Core::new(config)),
        }
    }

    /// Creates a new builder for configuring a bulkhead layer.
    ///
    /// # Examples
    ///
    /// ```
    /// use bento_bulkhead::BulkheadLayer;
    /// use std::time::Duration;
    ///
    /// let layer = BulkheadLayer::builder()
    ///     .name("upload-bh")
    ///     .max_concurrent_calls(4)
    ///     .max_queue(16)
    ///     .queue_timeout(Duration::from_secs(5))
    ///     .build();
    /// assert_eq!(layer.stats().max_queue, 16);
    /// ```
    pub fn builder() -> crate::BulkheadConfigBuilder {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "bulkhead_calls_permitted_total",
                    "Total number of calls that got a bulkhead slot"
                );
                describe_counter!(
                    "bulkhead_calls_rejected_total",
                    "Total number of calls rejected by the bulkhead"
                );
                describe_counter!(
                    "bulkhead_calls_total",
                    "Total number of calls that ran to completion"
                );
                describe_gauge!("bulkhead_active_calls", "Calls currently holding a slot");
                describe_gauge!("bulkhead_queued_calls", "Calls waiting for a slot");
                describe_histogram!(
                    "bulkhead_call_duration_seconds",
                    "Duration of calls through the bulkhead"
                );
            });
        }
        crate::BulkheadConfigBuilder::new()
    }

    /// Name of this bulkhead.
    pub fn name(&self) -> &str {
        &self.core.config.name
    }

    /// The bulkhead's configuration.
    pub fn config(&self) -> &BulkheadConfig {
        &self.core.config
    }

    /// Runs `f` when a slot is free, queueing if necessary.
    ///
    /// ```
    /// use bento_bulkhead::{BulkheadError, BulkheadLayer};
    ///
    /// # async fn example() {
    /// let bulkhead = BulkheadLayer::builder().max_concurrent_calls(1).build();
    /// let answer = bulkhead
    ///     .execute(|| async { Ok::<_, BulkheadError>(42) })
    ///     .await;
    /// assert_eq!(answer, Ok(42));
    /// # }
    /// ```
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<BulkheadError>,
    {
        self.core.execute(f).await
    }

    /// Current counters.
    pub fn stats(&self) -> BulkheadStats {
        self.core.stats()
    }

    /// Rejects every queued call with [`BulkheadError::Shutdown`] and empties
    /// the queue.
    pub fn shutdown(&self) {
        self.core.shutdown();
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> Arc<Core> {
        Arc::clone(&self.core)
    }
}

impl std::fmt::Debug for BulkheadLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadLayer")
            .field("name", &self.name())
            .finish()
    }
}

impl<S> Layer<S> for BulkheadLayer {
    type Service = Bulkhead<S>;

    fn layer(&self, service: S) -> Self::Service {
        Bulkhead::new(service, Arc::clone(&self.core))
    }
}
