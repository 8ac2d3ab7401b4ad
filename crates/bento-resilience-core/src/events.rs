//! Event plumbing for resilience patterns.
//!
//! Breakers, bulkheads, retries and time limiters all report what they do
//! through a [`ResilienceEvent`]. Listeners are optional: nothing in the
//! patterns depends on an event being observed.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by a named pattern instance.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Short, stable identifier of the event kind (e.g. `"state_transition"`).
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;

    /// Name of the breaker, bulkhead, retry or limiter that emitted it.
    fn pattern_name(&self) -> &str;
}

/// Receives events of type `E`.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: &E);
}

/// Shared, type-erased listener.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// Ordered set of listeners attached to one pattern instance.
#[derive(Clone)]
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Appends a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Appends a closure as a listener.
    pub fn add_fn<F>(&mut self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
        E: 'static,
    {
        self.add(FnListener::new(f));
    }

    /// Delivers `event` to every listener in registration order.
    ///
    /// A panicking listener is isolated: the panic is swallowed and the
    /// remaining listeners still run.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            #[cfg(feature = "tracing")]
            if outcome.is_err() {
                tracing::warn!(
                    pattern = event.pattern_name(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
            #[cfg(not(feature = "tracing"))]
            let _ = outcome;
        }
    }

    /// Returns true when no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
