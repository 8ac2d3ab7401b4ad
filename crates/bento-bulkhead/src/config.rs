//! Configuration for the bulkhead pattern.

use crate::events::BulkheadEvent;
use bento_resilience_core::events::{EventListeners, FnListener};
use bento_resilience_core::RejectReason;
use std::time::Duration;

/// Configuration for the bulkhead pattern.
#[derive(Clone)]
pub struct BulkheadConfig {
    /// Maximum number of concurrent calls allowed.
    pub(crate) max_concurrent_calls: usize,
    /// Maximum number of calls waiting for a slot.
    pub(crate) max_queue: usize,
    /// Maximum time a call may wait in the queue.
    pub(crate) queue_timeout: Duration,
    /// Name of this bulkhead instance.
    pub(crate) name: String,
    /// Event listeners.
    pub(crate) event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    /// Name of this bulkhead.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of concurrent calls.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls
    }

    /// Maximum queue length.
    pub fn max_queue(&self) -> usize {
        self.max_queue
    }

    /// Maximum time spent queued.
    pub fn queue_timeout(&self) -> Duration {
        self.queue_timeout
    }
}

/// Builder for bulkhead configuration.
pub struct BulkheadConfigBuilder {
    max_concurrent_calls: usize,
    max_queue: usize,
    queue_timeout: Duration,
    name: String,
    event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_concurrent_calls: 10,
            max_queue: 100,
            queue_timeout: Duration::from_secs(30),
            name: "bulkhead".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the maximum number of concurrent calls.
    ///
    /// Default: 10
    pub fn max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = max;
        self
    }

    /// Sets how many calls may wait for a slot. With `0` a busy bulkhead
    /// rejects immediately.
    ///
    /// Default: 100
    pub fn max_queue(mut self, max: usize) -> Self {
        self.max_queue = max;
        self
    }

    /// Sets how long a call may wait in the queue before it is rejected.
    ///
    /// Default: 30 seconds
    pub fn queue_timeout(mut self, duration: Duration) -> Self {
        self.queue_timeout = duration;
        self
    }

    /// Sets the name of this bulkhead instance.
    ///
    /// Default: "bulkhead"
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a call gets a slot.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - Called with the number of active calls including this one.
    ///
    /// # Example
    /// ```rust,no_run
    /// use bento_bulkhead::BulkheadConfig;
    ///
    /// let layer = BulkheadConfig::builder()
    ///     .max_concurrent_calls(10)
    ///     .on_call_permitted(|active| {
    ///         if active >= 8 {
    ///             println!("uploads bulkhead nearly saturated ({} active)", active);
    ///         }
    ///     })
    ///     .build();
    /// ```
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallPermitted {
                concurrent_calls, ..
            } = event
            {
                f(*concurrent_calls);
            }
        }));
        self
    }

    /// Registers a callback when a call joins the wait queue, with the queue
    /// length including it.
    pub fn on_call_queued<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallQueued { queue_len, .. } = event {
                f(*queue_len);
            }
        }));
        self
    }

    /// Registers a callback when a call is rejected.
    ///
    /// # Example
    /// ```rust,no_run
    /// use bento_bulkhead::BulkheadConfig;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let rejections = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&rejections);
    ///
    /// let layer = BulkheadConfig::builder()
    ///     .max_concurrent_calls(2)
    ///     .on_call_rejected(move |reason| {
    ///         counter.fetch_add(1, Ordering::SeqCst);
    ///         println!("rejected: {}", reason);
    ///     })
    ///     .build();
    /// ```
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(RejectReason) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallRejected { reason, .. } = event {
                f(*reason);
            }
        }));
        self
    }

    /// Registers a callback when a call finishes successfully, with the time
    /// from admission to completion.
    pub fn on_call_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallFinished { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback when a call fails with an error.
    pub fn on_call_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallFailed { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Builds the configuration and returns a BulkheadLayer.
    pub fn build(self) -> crate::layer::BulkheadLayer {
        let config = BulkheadConfig {
            max_concurrent_calls: self.max_concurrent_calls,
            max_queue: self.max_queue,
            queue_timeout: self.queue_timeout,
            name: self.name,
            event_listeners: self.event_listeners,
        };
        crate::layer::BulkheadLayer::new(config)
    }
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
