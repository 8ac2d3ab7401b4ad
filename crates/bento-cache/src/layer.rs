use crate::config::{CacheConfig, CacheConfigBuilder};
use crate::events::CacheEvent;
use crate::store::{CacheStats, ResponseCache};
use crate::Cache;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tower::Layer;

/// A Tower [`Layer`] that applies the response cache.
///
/// The store lives in the layer: every service it wraps, and every clone
/// of it, reads and writes the same entries.
///
/// ```
/// use bento_cache::CacheLayer;
///
/// let cache = CacheLayer::builder().default_rules().build();
/// assert_eq!(cache.stats().size, 0);
/// ```
#[derive(Clone)]
pub struct CacheLayer {
    config: Arc<CacheConfig>,
    store: Arc<ResponseCache>,
}

impl CacheLayer {
    pub fn new(config: CacheConfig) -> Self {
        crate::describe_metrics();
        Self {
            config: Arc::new(config),
            store: Arc::new(ResponseCache::new()),
        }
    }

    /// Creates a new builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfig::builder()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The shared store.
    pub fn store(&self) -> &Arc<ResponseCache> {
        &self.store
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Clears entries related to a successful write on `path`. Returns the
    /// total number removed.
    pub fn invalidate_for_write(&self, path: &str) -> usize {
        invalidate(&self.config, &self.store, path)
    }

    /// Spawns a task that sweeps stale entries every `sweep_interval`.
    ///
    /// Must be called within a Tokio runtime. Abort the handle to stop it.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let config = Arc::clone(&self.config);
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.sweep_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep();
                if removed > 0 {
                    config.event_listeners.emit(&CacheEvent::Swept {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        removed,
                    });

                    #[cfg(feature = "tracing")]
                    tracing::debug!(cache = %config.name, removed, "swept stale entries");
                }

                #[cfg(feature = "metrics")]
                metrics::gauge!("cache_size", "cache" => config.name.clone()).set(store.len() as f64);
            }
        })
    }
}

pub(crate) fn invalidate(config: &CacheConfig, store: &ResponseCache, path: &str) -> usize {
    let mut total = 0;
    for (fragment, removed) in store.invalidate_for_write(path) {
        total += removed;
        config.event_listeners.emit(&CacheEvent::Invalidated {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            fragment: fragment.to_string(),
            removed,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(cache = %config.name, fragment, removed, path, "invalidated after write");

        #[cfg(feature = "metrics")]
        metrics::counter!("cache_invalidations_total", "cache" => config.name.clone())
            .increment(removed as u64);
    }
    total
}

impl std::fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("name", &self.config.name)
            .field("rules", &self.config.rules.len())
            .field("size", &self.store.len())
            .finish()
    }
}

impl<S> Layer<S> for CacheLayer {
    type Service = Cache<S>;

    fn layer(&self, service: S) -> Self::Service {
        Cache::new(service, Arc::clone(&self.config), Arc::clone(&self.store))
    }
}
