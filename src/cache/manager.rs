//! Cache registry, aggregate statistics, and background cleanup

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info};

use super::entry::CacheStats;

/// Capability interface every registered cache implements.
///
/// The cleanup worker only ever touches cache-internal state through this
/// trait; it never calls back into manager state.
pub trait ManagedCache: Send + Sync {
    fn name(&self) -> &str;
    fn stats(&self) -> CacheStats;
    fn memory_used(&self) -> usize;
    /// Approximate cleanup pass; returns the number of dropped entries.
    fn optimize(&self) -> usize;
    fn clear(&self);
}

/// Registers caches, aggregates their statistics, and runs periodic global
/// cleanup when total memory use crosses the pressure threshold.
pub struct CacheManager {
    caches: Arc<Mutex<Vec<Arc<dyn ManagedCache>>>>,
    memory_pressure_bytes: usize,
    worker: Option<CleanupWorker>,
}

struct CleanupWorker {
    shutdown_tx: flume::Sender<()>,
    handle: JoinHandle<()>,
}

impl CacheManager {
    /// Create a manager that treats `memory_pressure_bytes` of aggregate
    /// cache memory as the cleanup trigger.
    #[must_use]
    pub fn new(memory_pressure_bytes: usize) -> Self {
        Self {
            caches: Arc::new(Mutex::new(Vec::new())),
            memory_pressure_bytes,
            worker: None,
        }
    }

    /// Register a cache for statistics aggregation and cleanup.
    pub fn register(&self, cache: Arc<dyn ManagedCache>) {
        let mut caches = self.lock_caches();
        debug!("cache manager: registered {}", cache.name());
        caches.push(cache);
    }

    #[must_use]
    pub fn cache_count(&self) -> usize {
        self.lock_caches().len()
    }

    /// Counters summed across every registered cache.
    #[must_use]
    pub fn aggregate_stats(&self) -> CacheStats {
        let caches = self.lock_caches();
        let mut total = CacheStats::default();
        for cache in caches.iter() {
            total.merge(&cache.stats());
        }
        total
    }

    #[must_use]
    pub fn total_memory_used(&self) -> usize {
        self.lock_caches().iter().map(|c| c.memory_used()).sum()
    }

    /// One cleanup pass: when aggregate memory exceeds the pressure
    /// threshold, run every cache's `optimize`; if that is not enough,
    /// clear the caches outright. Returns the number of dropped entries.
    pub fn run_cleanup(&self) -> usize {
        let caches: Vec<Arc<dyn ManagedCache>> = self.lock_caches().clone();
        Self::cleanup_pass(&caches, self.memory_pressure_bytes)
    }

    fn cleanup_pass(caches: &[Arc<dyn ManagedCache>], pressure: usize) -> usize {
        let used: usize = caches.iter().map(|c| c.memory_used()).sum();
        if used <= pressure {
            return 0;
        }

        let mut dropped = 0;
        for cache in caches {
            dropped += cache.optimize();
        }

        let still_used: usize = caches.iter().map(|c| c.memory_used()).sum();
        if still_used > pressure {
            for cache in caches {
                let before = cache.stats().entries;
                cache.clear();
                dropped += before;
                info!("cache manager: cleared {} under memory pressure", cache.name());
            }
        } else {
            debug!("cache manager: cleanup dropped {dropped} entries ({used} -> {still_used} bytes)");
        }
        dropped
    }

    /// Start the background cleanup worker, ticking every `interval`.
    ///
    /// Restarting replaces the previous worker. The worker holds only the
    /// cache registry; it stops when the manager drops.
    pub fn start_background_cleanup(&mut self, interval: Duration) {
        self.stop_background_cleanup();

        let (shutdown_tx, shutdown_rx) = flume::bounded::<()>(1);
        let caches = Arc::clone(&self.caches);
        let pressure = self.memory_pressure_bytes;

        let handle = std::thread::spawn(move || {
            loop {
                match shutdown_rx.recv_timeout(interval) {
                    Err(flume::RecvTimeoutError::Timeout) => {
                        let snapshot: Vec<Arc<dyn ManagedCache>> = caches
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .clone();
                        Self::cleanup_pass(&snapshot, pressure);
                    }
                    // Explicit shutdown or manager dropped.
                    Ok(()) | Err(flume::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        self.worker = Some(CleanupWorker {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background worker, if running.
    pub fn stop_background_cleanup(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.shutdown_tx.send(());
            let _ = worker.handle.join();
        }
    }

    fn lock_caches(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn ManagedCache>>> {
        self.caches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        self.stop_background_cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{TransformCache, TransformCacheConfig};
    use crate::transform::AffineTransform;

    fn filled_cache(name: &str, entries: usize) -> Arc<TransformCache> {
        let cache = Arc::new(TransformCache::new(
            name,
            TransformCacheConfig {
                max_entries: 64,
                max_memory_bytes: 1 << 20,
                ..TransformCacheConfig::default()
            },
        ));
        for i in 0..entries {
            cache.set(format!("{name}:{i}"), AffineTransform::identity(), Some(100));
        }
        cache
    }

    #[test]
    fn aggregates_stats_across_registered_caches() {
        let manager = CacheManager::new(1 << 20);
        let a = filled_cache("a", 3);
        let b = filled_cache("b", 2);
        let _ = a.get("a:0");
        manager.register(a.clone());
        manager.register(b.clone());

        let stats = manager.aggregate_stats();
        assert_eq!(stats.entries, 5);
        assert_eq!(stats.hits, 1);
        assert_eq!(manager.total_memory_used(), 500);
        assert_eq!(manager.cache_count(), 2);
    }

    #[test]
    fn cleanup_noop_below_pressure_threshold() {
        let manager = CacheManager::new(1 << 20);
        let cache = filled_cache("a", 4);
        manager.register(cache.clone());

        assert_eq!(manager.run_cleanup(), 0);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn cleanup_clears_caches_under_sustained_pressure() {
        // Threshold of zero forces the clear path.
        let manager = CacheManager::new(0);
        let cache = filled_cache("a", 4);
        manager.register(cache.clone());

        let dropped = manager.run_cleanup();
        assert!(dropped >= 4);
        assert!(cache.is_empty());
    }

    #[test]
    fn background_worker_starts_and_stops_cleanly() {
        let mut manager = CacheManager::new(0);
        let cache = filled_cache("a", 4);
        manager.register(cache.clone());

        manager.start_background_cleanup(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(50));
        manager.stop_background_cleanup();

        assert!(cache.is_empty());
    }
}
