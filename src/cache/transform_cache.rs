//! Bounded key → transform cache with LRU eviction and a memory ceiling

use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, trace};
use lru::LruCache;

use super::entry::{CacheEntry, CacheStats};
use super::manager::ManagedCache;
use crate::transform::AffineTransform;

/// Fixed per-entry size estimate. The matrix payload is constant-size, so
/// the estimate is O(1) and only the key length varies.
const ENTRY_BASE_BYTES: usize = 160;

/// Limits and optimization thresholds for a [`TransformCache`].
#[derive(Clone, Copy, Debug)]
pub struct TransformCacheConfig {
    /// Hard cap on entry count.
    pub max_entries: usize,
    /// Hard cap on estimated memory use, in bytes.
    pub max_memory_bytes: usize,
    /// `optimize()` drops entries idle longer than this...
    pub optimize_max_idle: Duration,
    /// ...unless they have been hit at least this many times.
    pub optimize_min_hits: u64,
}

impl Default for TransformCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            max_memory_bytes: 256 * 1024,
            optimize_max_idle: Duration::from_secs(120),
            optimize_min_hits: 2,
        }
    }
}

struct Inner {
    entries: LruCache<String, CacheEntry<AffineTransform>>,
    memory_used: usize,
    generation: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Thread-safe bounded cache mapping string keys to computed transforms.
///
/// All public methods serialize under one internal mutex, so a shared
/// reference can be handed to the background cleanup worker.
pub struct TransformCache {
    name: String,
    config: TransformCacheConfig,
    inner: Mutex<Inner>,
}

impl TransformCache {
    #[must_use]
    pub fn new(name: impl Into<String>, config: TransformCacheConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                memory_used: 0,
                generation: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Look up a transform, promoting it to most-recently-used on a hit.
    ///
    /// Expired entries are dropped here (lazy TTL) and count as misses.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<AffineTransform> {
        let mut inner = self.lock();
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                inner.misses += 1;
                return None;
            }
        };

        if expired {
            if let Some(old) = inner.entries.pop(key) {
                inner.memory_used = inner.memory_used.saturating_sub(old.size_hint);
            }
            inner.misses += 1;
            return None;
        }

        let value = {
            let entry = inner.entries.get_mut(key).expect("entry checked above");
            entry.touch();
            entry.value.clone()
        };
        inner.hits += 1;
        Some(value)
    }

    /// Insert a transform, evicting least-recently-used entries until both
    /// the entry-count and memory limits hold.
    pub fn set(&self, key: impl Into<String>, value: AffineTransform, size_hint: Option<usize>) {
        self.set_with_ttl(key, value, size_hint, None);
    }

    /// [`TransformCache::set`] with a per-entry time-to-live.
    pub fn set_with_ttl(
        &self,
        key: impl Into<String>,
        value: AffineTransform,
        size_hint: Option<usize>,
        ttl: Option<Duration>,
    ) {
        let key = key.into();
        let size = size_hint.unwrap_or(ENTRY_BASE_BYTES + key.len());
        if size > self.config.max_memory_bytes || self.config.max_entries == 0 {
            // Oversized for the whole budget; a miss is recomputed anyway.
            debug!("{}: refusing oversized entry {key} ({size} bytes)", self.name);
            return;
        }
        let mut inner = self.lock();

        if let Some(old) = inner.entries.pop(&key) {
            inner.memory_used = inner.memory_used.saturating_sub(old.size_hint);
        }

        while !inner.entries.is_empty()
            && (inner.entries.len() >= self.config.max_entries
                || inner.memory_used + size > self.config.max_memory_bytes)
        {
            if let Some((evicted_key, evicted)) = inner.entries.pop_lru() {
                inner.memory_used = inner.memory_used.saturating_sub(evicted.size_hint);
                inner.evictions += 1;
                trace!("{}: evicted {evicted_key}", self.name);
            }
        }

        let generation = inner.generation;
        inner
            .entries
            .push(key, CacheEntry::new(value, size, ttl, generation));
        inner.memory_used += size;
    }

    /// Remove a single entry. Returns true when the key was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.lock();
        match inner.entries.pop(key) {
            Some(old) => {
                inner.memory_used = inner.memory_used.saturating_sub(old.size_hint);
                true
            }
            None => false,
        }
    }

    /// Remove every entry whose key contains `pattern`. Returns the count.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut inner = self.lock();
        let matches: Vec<String> = inner
            .entries
            .iter()
            .filter(|(k, _)| k.contains(pattern))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &matches {
            if let Some(old) = inner.entries.pop(key) {
                inner.memory_used = inner.memory_used.saturating_sub(old.size_hint);
            }
        }
        if !matches.is_empty() {
            debug!("{}: invalidated {} entries matching {pattern:?}", self.name, matches.len());
        }
        matches.len()
    }

    /// Advance the generation counter and return the new value.
    ///
    /// Entries inserted from now on carry the new tag; a later
    /// [`TransformCache::invalidate_generation`] call with the previous value
    /// sweeps everything inserted before this point. This pair is the
    /// explicit bulk-invalidation hook for external cache owners;
    /// `ViewerSession` does not call it, since its revision-tagged keys let
    /// stale entries age out through LRU instead.
    pub fn bump_generation(&self) -> u64 {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.generation
    }

    /// Remove entries tagged at or below `generation`. Returns the count.
    pub fn invalidate_generation(&self, generation: u64) -> usize {
        let mut inner = self.lock();
        let stale: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.generation <= generation)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &stale {
            if let Some(old) = inner.entries.pop(key) {
                inner.memory_used = inner.memory_used.saturating_sub(old.size_hint);
            }
        }
        stale.len()
    }

    /// Drop everything, keeping hit/miss counters.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.memory_used = 0;
    }

    /// Approximate cleanup pass: drops expired entries and entries that are
    /// both old and rarely hit. Safe to run from a background timer.
    pub fn optimize(&self) -> usize {
        let mut inner = self.lock();
        let now = Instant::now();
        let stale: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| {
                e.is_expired(now)
                    || (now.duration_since(e.last_access) > self.config.optimize_max_idle
                        && e.access_count < self.config.optimize_min_hits)
            })
            .map(|(k, _)| k.clone())
            .collect();

        for key in &stale {
            if let Some(old) = inner.entries.pop(key) {
                inner.memory_used = inner.memory_used.saturating_sub(old.size_hint);
            }
        }
        if !stale.is_empty() {
            debug!("{}: optimize dropped {} entries", self.name, stale.len());
        }
        stale.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    #[must_use]
    pub fn memory_used(&self) -> usize {
        self.lock().memory_used
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            entries: inner.entries.len(),
            memory_used: inner.memory_used,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ManagedCache for TransformCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn stats(&self) -> CacheStats {
        TransformCache::stats(self)
    }

    fn memory_used(&self) -> usize {
        TransformCache::memory_used(self)
    }

    fn optimize(&self) -> usize {
        TransformCache::optimize(self)
    }

    fn clear(&self) {
        TransformCache::clear(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn small_cache(max_entries: usize) -> TransformCache {
        TransformCache::new(
            "test",
            TransformCacheConfig {
                max_entries,
                max_memory_bytes: usize::MAX,
                ..TransformCacheConfig::default()
            },
        )
    }

    #[test]
    fn get_after_set_returns_same_value() {
        let cache = small_cache(8);
        let t = AffineTransform::scaling(2.0, 3.0);
        cache.set("zoom:2", t.clone(), None);

        let got = cache.get("zoom:2").unwrap();
        assert_eq!(got, t);
        assert_eq!(got.apply(Point::new(10.0, 20.0)), Point::new(20.0, 60.0));
    }

    #[test]
    fn lru_eviction_drops_oldest() {
        let cache = small_cache(3);
        for i in 0..3 {
            cache.set(format!("k{i}"), AffineTransform::translation(i as f64, 0.0), None);
        }
        cache.set("k3", AffineTransform::translation(3.0, 0.0), None);

        assert!(cache.get("k0").is_none());
        assert!(cache.get("k3").is_some());
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn get_promotes_most_recently_used() {
        let cache = small_cache(2);
        cache.set("a", AffineTransform::identity(), None);
        cache.set("b", AffineTransform::identity(), None);
        let _ = cache.get("a");
        cache.set("c", AffineTransform::identity(), None);

        // "b" was least recently used once "a" got promoted.
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn memory_ceiling_is_enforced() {
        let cache = TransformCache::new(
            "mem",
            TransformCacheConfig {
                max_entries: 100,
                max_memory_bytes: 1000,
                ..TransformCacheConfig::default()
            },
        );
        for i in 0..10 {
            cache.set(format!("k{i}"), AffineTransform::identity(), Some(300));
        }
        assert!(cache.memory_used() <= 1000);
        assert!(cache.len() <= 3);
        assert!(cache.stats().evictions > 0);
    }

    #[test]
    fn invalidate_pattern_removes_matching_keys() {
        let cache = small_cache(16);
        cache.set("zoom:1", AffineTransform::identity(), None);
        cache.set("zoom:2", AffineTransform::identity(), None);
        cache.set("pan:1", AffineTransform::identity(), None);

        assert_eq!(cache.invalidate_pattern("zoom:"), 2);
        assert!(cache.get("zoom:1").is_none());
        assert!(cache.get("pan:1").is_some());
    }

    #[test]
    fn generation_invalidation_sweeps_older_entries() {
        let cache = small_cache(16);
        cache.set("old", AffineTransform::identity(), None);
        let old_gen = cache.bump_generation() - 1;
        cache.set("new", AffineTransform::identity(), None);

        assert_eq!(cache.invalidate_generation(old_gen), 1);
        assert!(cache.get("old").is_none());
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn ttl_expires_lazily_on_lookup() {
        let cache = small_cache(16);
        cache.set_with_ttl("gone", AffineTransform::identity(), None, Some(Duration::ZERO));
        cache.set("kept", AffineTransform::identity(), None);

        assert!(cache.get("gone").is_none());
        assert!(cache.get("kept").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn optimize_drops_expired_entries() {
        let cache = small_cache(16);
        cache.set_with_ttl("a", AffineTransform::identity(), None, Some(Duration::ZERO));
        cache.set("b", AffineTransform::identity(), None);

        assert_eq!(cache.optimize(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn stats_track_hits_misses_and_memory() {
        let cache = small_cache(16);
        cache.set("a", AffineTransform::identity(), Some(100));
        let _ = cache.get("a");
        let _ = cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.memory_used, 100);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn clear_resets_contents_and_memory() {
        let cache = small_cache(16);
        cache.set("a", AffineTransform::identity(), None);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.memory_used(), 0);
    }
}
