//! Slot accounting and the FIFO wait queue shared by every handle of one
//! bulkhead.

use crate::config::BulkheadConfig;
use crate::error::BulkheadError;
use crate::events::BulkheadEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::oneshot;

/// Point-in-time view of a bulkhead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkheadStats {
    /// Bulkhead name.
    pub name: String,
    /// Calls currently holding a slot.
    pub active: usize,
    /// Calls waiting for a slot.
    pub queued: usize,
    /// Configured concurrency limit.
    pub max_concurrent: usize,
    /// Configured queue limit.
    pub max_queue: usize,
    /// Calls that ran to completion, successfully or not.
    pub total_executed: u64,
    /// Calls turned away (full, queue timeout, shutdown).
    pub total_rejected: u64,
}

struct Waiter {
    id: u64,
    wake: oneshot::Sender<()>,
}

#[derive(Default)]
struct State {
    active: usize,
    queue: VecDeque<Waiter>,
    next_id: u64,
    total_executed: u64,
    total_rejected: u64,
}

impl State {
    /// Hands a finished call's slot to the oldest waiter still listening,
    /// or frees it when nobody is waiting.
    fn release(&mut self) {
        while let Some(waiter) = self.queue.pop_front() {
            if waiter.wake.send(()).is_ok() {
                return;
            }
        }
        self.active = self.active.saturating_sub(1);
    }

    fn remove(&mut self, id: u64) -> bool {
        match self.queue.iter().position(|w| w.id == id) {
            Some(pos) => {
                self.queue.remove(pos);
                true
            }
            None => false,
        }
    }
}

pub(crate) struct Core {
    pub(crate) config: BulkheadConfig,
    state: Mutex<State>,
}

/// A held slot. Dropping it passes the slot on.
pub(crate) struct Slot {
    core: Arc<Core>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        let mut state = self.core.lock();
        state.release();
        self.core.publish_gauges(&state);
    }
}

/// A call waiting in the queue. Dropping it before it settles (the caller
/// went away) takes it out of the queue, or passes on a slot it was
/// handed in the meantime.
struct Queued {
    core: Arc<Core>,
    id: u64,
    rx: oneshot::Receiver<()>,
    settled: bool,
}

impl Queued {
    async fn wait(mut self) -> Result<Slot, BulkheadError> {
        let outcome = tokio::time::timeout(self.core.config.queue_timeout, &mut self.rx).await;
        self.settled = true;

        match outcome {
            Ok(Ok(())) => {
                let active = self.core.lock().active;
                self.core.permitted(active);
                Ok(Slot {
                    core: Arc::clone(&self.core),
                })
            }
            Ok(Err(_)) => Err(self.core.reject(BulkheadError::Shutdown {
                name: self.core.config.name.clone(),
            })),
            Err(_) => {
                let expired = {
                    let mut state = self.core.lock();
                    let expired = if state.remove(self.id) {
                        true
                    } else if self.rx.try_recv().is_ok() {
                        // Handed a slot as the timer fired; it must not run.
                        state.release();
                        true
                    } else {
                        false
                    };
                    if expired {
                        state.total_rejected += 1;
                    }
                    self.core.publish_gauges(&state);
                    expired
                };

                let err = if expired {
                    BulkheadError::QueueTimeout {
                        name: self.core.config.name.clone(),
                        waited: self.core.config.queue_timeout,
                    }
                } else {
                    BulkheadError::Shutdown {
                        name: self.core.config.name.clone(),
                    }
                };
                Err(self.core.reject(err))
            }
        }
    }
}

impl Drop for Queued {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.core.lock();
        if !state.remove(self.id) && self.rx.try_recv().is_ok() {
            state.release();
        }
        self.core.publish_gauges(&state);
    }
}

impl Core {
    pub(crate) fn new(config: BulkheadConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire(self: &Arc<Self>) -> Result<Slot, BulkheadError> {
        let queued = {
            let mut state = self.lock();

            if state.active < self.config.max_concurrent_calls {
                state.active += 1;
                let active = state.active;
                self.publish_gauges(&state);
                drop(state);
                self.permitted(active);
                return Ok(Slot {
                    core: Arc::clone(self),
                });
            }

            if state.queue.len() >= self.config.max_queue {
                state.total_rejected += 1;
                drop(state);
                let err = if self.config.max_queue == 0 {
                    BulkheadError::BulkheadFull {
                        name: self.config.name.clone(),
                        max_concurrent_calls: self.config.max_concurrent_calls,
                    }
                } else {
                    BulkheadError::QueueFull {
                        name: self.config.name.clone(),
                        max_queue: self.config.max_queue,
                    }
                };
                return Err(self.reject(err));
            }

            let id = state.next_id;
            state.next_id += 1;
            let (wake, rx) = oneshot::channel();
            state.queue.push_back(Waiter { id, wake });
            let queue_len = state.queue.len();
            self.publish_gauges(&state);
            drop(state);

            self.config
                .event_listeners
                .emit(&BulkheadEvent::CallQueued {
                    pattern_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    queue_len,
                });

            #[cfg(feature = "tracing")]
            tracing::debug!(bulkhead = %self.config.name, queue_len, "call queued");

            Queued {
                core: Arc::clone(self),
                id,
                rx,
                settled: false,
            }
        };

        queued.wait().await
    }

    /// Runs `f` once a slot is available.
    pub(crate) async fn execute<F, Fut, T, E>(self: &Arc<Self>, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<BulkheadError>,
    {
        let slot = self.acquire().await.map_err(E::from)?;
        let start = Instant::now();
        let result = f().await;
        self.finished(result.is_ok(), start);
        drop(slot);
        result
    }

    /// Rejects every queued call and empties the queue. Running calls are
    /// not affected.
    pub(crate) fn shutdown(&self) {
        let drained: Vec<Waiter> = {
            let mut state = self.lock();
            let drained: Vec<Waiter> = state.queue.drain(..).collect();
            state.total_rejected += drained.len() as u64;
            self.publish_gauges(&state);
            drained
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            bulkhead = %self.config.name,
            rejected = drained.len(),
            "bulkhead shut down"
        );

        drop(drained);
    }

    pub(crate) fn stats(&self) -> BulkheadStats {
        let state = self.lock();
        BulkheadStats {
            name: self.config.name.clone(),
            active: state.active,
            queued: state.queue.len(),
            max_concurrent: self.config.max_concurrent_calls,
            max_queue: self.config.max_queue,
            total_executed: state.total_executed,
            total_rejected: state.total_rejected,
        }
    }

    fn permitted(&self, concurrent_calls: usize) {
        self.config
            .event_listeners
            .emit(&BulkheadEvent::CallPermitted {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                concurrent_calls,
            });

        #[cfg(feature = "metrics")]
        counter!("bulkhead_calls_permitted_total", "bulkhead" => self.config.name.clone())
            .increment(1);
    }

    fn reject(&self, err: BulkheadError) -> BulkheadError {
        let reason = err.reason();
        self.config
            .event_listeners
            .emit(&BulkheadEvent::CallRejected {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                reason,
            });

        #[cfg(feature = "tracing")]
        tracing::warn!(bulkhead = %self.config.name, %reason, "call rejected");

        #[cfg(feature = "metrics")]
        counter!(
            "bulkhead_calls_rejected_total",
            "bulkhead" => self.config.name.clone(),
            "reason" => reason.to_string()
        )
        .increment(1);

        err
    }

    fn finished(&self, ok: bool, start: Instant) {
        self.lock().total_executed += 1;
        let duration = start.elapsed();

        let event = if ok {
            BulkheadEvent::CallFinished {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                duration,
            }
        } else {
            BulkheadEvent::CallFailed {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                duration,
            }
        };
        self.config.event_listeners.emit(&event);

        #[cfg(feature = "metrics")]
        {
            let outcome = if ok { "finished" } else { "failed" };
            counter!("bulkhead_calls_total", "bulkhead" => self.config.name.clone(), "outcome" => outcome)
                .increment(1);
            metrics::histogram!("bulkhead_call_duration_seconds", "bulkhead" => self.config.name.clone())
                .record(duration.as_secs_f64());
        }
    }

    #[allow(unused_variables)]
    fn publish_gauges(&self, state: &State) {
        #[cfg(feature = "metrics")]
        {
            gauge!("bulkhead_active_calls", "bulkhead" => self.config.name.clone())
                .set(state.active as f64);
            gauge!("bulkhead_queued_calls", "bulkhead" => self.config.name.clone())
                .set(state.queue.len() as f64);
        }
    }
}
