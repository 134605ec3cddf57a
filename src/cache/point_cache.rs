//! Spatially-indexed cache of transformed points
//!
//! Keys are `(x, y, transform key)`; values are the transformed points. A
//! uniform grid over the source coordinates serves "what cached points are
//! near (x, y)?" queries without scanning the whole cache.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use log::debug;
use lru::LruCache;

use super::entry::{CacheEntry, CacheStats};
use super::manager::ManagedCache;
use crate::geometry::Point;

/// Estimated bytes per cached point (key, value, metadata, index share).
const POINT_ENTRY_BYTES: usize = 120;

/// Limits for a [`PointCache`].
#[derive(Clone, Copy, Debug)]
pub struct PointCacheConfig {
    /// Hard cap on entry count.
    pub max_entries: usize,
    /// Edge length of a spatial grid cell, in source coordinates.
    pub grid_size: f64,
}

impl Default for PointCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            grid_size: 64.0,
        }
    }
}

/// Cache key: exact source coordinates (bit patterns, so lookups are exact)
/// plus the transform they were mapped through.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PointKey {
    x_bits: u64,
    y_bits: u64,
    transform_key: Arc<str>,
}

impl PointKey {
    fn new(x: f64, y: f64, transform_key: &str) -> Self {
        Self {
            x_bits: x.to_bits(),
            y_bits: y.to_bits(),
            transform_key: Arc::from(transform_key),
        }
    }

    fn source(&self) -> Point {
        Point::new(f64::from_bits(self.x_bits), f64::from_bits(self.y_bits))
    }
}

/// A spatial query result: the cached source point and its transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NearbyPoint {
    pub source: Point,
    pub transformed: Point,
}

struct Inner {
    entries: LruCache<PointKey, CacheEntry<Point>>,
    grid: HashMap<(i64, i64), HashSet<PointKey>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Inner {
    fn remove_from_grid(&mut self, cell: (i64, i64), key: &PointKey) {
        if let Some(bucket) = self.grid.get_mut(&cell) {
            bucket.remove(key);
            if bucket.is_empty() {
                self.grid.remove(&cell);
            }
        }
    }
}

/// Bounded point cache with strict LRU eviction and a uniform-grid index.
pub struct PointCache {
    name: String,
    config: PointCacheConfig,
    inner: Mutex<Inner>,
}

impl PointCache {
    #[must_use]
    pub fn new(name: impl Into<String>, config: PointCacheConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                grid: HashMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.config.grid_size).floor() as i64,
            (y / self.config.grid_size).floor() as i64,
        )
    }

    /// Look up the transformed point for `(x, y)` under `transform_key`.
    #[must_use]
    pub fn get(&self, x: f64, y: f64, transform_key: &str) -> Option<Point> {
        let key = PointKey::new(x, y, transform_key);
        let mut inner = self.lock();
        match inner.entries.get_mut(&key) {
            Some(entry) => {
                entry.touch();
                let value = entry.value;
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Cache the transformed point for `(x, y)` under `transform_key`,
    /// evicting strict-LRU entries past `max_entries`.
    pub fn set(&self, x: f64, y: f64, transform_key: &str, transformed: Point) {
        if self.config.max_entries == 0 {
            return;
        }
        let key = PointKey::new(x, y, transform_key);
        let cell = self.cell_of(x, y);
        let mut inner = self.lock();

        // In-place update: replacing a key must not evict a neighbor.
        if inner.entries.pop(&key).is_some() {
            inner.remove_from_grid(cell, &key);
        }

        while inner.entries.len() >= self.config.max_entries {
            if let Some((evicted_key, _)) = inner.entries.pop_lru() {
                let src = evicted_key.source();
                let evicted_cell = self.cell_of(src.x, src.y);
                inner.remove_from_grid(evicted_cell, &evicted_key);
                inner.evictions += 1;
            }
        }

        inner
            .entries
            .push(key.clone(), CacheEntry::new(transformed, POINT_ENTRY_BYTES, None, 0));
        inner.grid.entry(cell).or_default().insert(key);
    }

    /// All cached points within `radius` of `(x, y)` that were transformed
    /// through `transform_key`. Served from the grid index; does not touch
    /// LRU order.
    #[must_use]
    pub fn nearby_points(&self, x: f64, y: f64, radius: f64, transform_key: &str) -> Vec<NearbyPoint> {
        if radius < 0.0 {
            return Vec::new();
        }
        let inner = self.lock();
        let min_cell = self.cell_of(x - radius, y - radius);
        let max_cell = self.cell_of(x + radius, y + radius);
        let center = Point::new(x, y);

        let mut found = Vec::new();
        for cx in min_cell.0..=max_cell.0 {
            for cy in min_cell.1..=max_cell.1 {
                let Some(bucket) = inner.grid.get(&(cx, cy)) else {
                    continue;
                };
                for key in bucket {
                    if key.transform_key.as_ref() != transform_key {
                        continue;
                    }
                    let source = key.source();
                    if source.distance_to(center) <= radius {
                        if let Some(entry) = inner.entries.peek(key) {
                            found.push(NearbyPoint {
                                source,
                                transformed: entry.value,
                            });
                        }
                    }
                }
            }
        }
        found
    }

    /// Remove every entry cached under `transform_key`, keeping the grid
    /// index consistent.
    pub fn invalidate_transform(&self, transform_key: &str) -> usize {
        let mut inner = self.lock();
        let stale: Vec<PointKey> = inner
            .entries
            .iter()
            .filter(|(k, _)| k.transform_key.as_ref() == transform_key)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &stale {
            inner.entries.pop(key);
            let src = key.source();
            let cell = self.cell_of(src.x, src.y);
            inner.remove_from_grid(cell, key);
        }
        if !stale.is_empty() {
            debug!("{}: invalidated {} points for {transform_key}", self.name, stale.len());
        }
        stale.len()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.grid.clear();
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
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            entries: inner.entries.len(),
            memory_used: inner.entries.len() * POINT_ENTRY_BYTES,
        }
    }

    /// Consistency check used by tests: every grid reference must point at a
    /// live cache entry, and every entry must be indexed.
    #[must_use]
    pub fn index_is_consistent(&self) -> bool {
        let inner = self.lock();
        let indexed: usize = inner.grid.values().map(HashSet::len).sum();
        if indexed != inner.entries.len() {
            return false;
        }
        inner
            .grid
            .values()
            .flatten()
            .all(|key| inner.entries.peek(key).is_some())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ManagedCache for PointCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn stats(&self) -> CacheStats {
        PointCache::stats(self)
    }

    fn memory_used(&self) -> usize {
        self.len() * POINT_ENTRY_BYTES
    }

    fn optimize(&self) -> usize {
        // Point entries carry no TTL; LRU bounding is the whole policy.
        0
    }

    fn clear(&self) {
        PointCache::clear(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_entries: usize) -> PointCache {
        PointCache::new(
            "points",
            PointCacheConfig {
                max_entries,
                grid_size: 10.0,
            },
        )
    }

    #[test]
    fn get_after_set_returns_transformed_point() {
        let c = cache(16);
        c.set(1.0, 2.0, "zoom:2", Point::new(2.0, 4.0));

        assert_eq!(c.get(1.0, 2.0, "zoom:2"), Some(Point::new(2.0, 4.0)));
        assert_eq!(c.get(1.0, 2.0, "zoom:3"), None);
    }

    #[test]
    fn lru_eviction_keeps_index_consistent() {
        let c = cache(3);
        for i in 0..5 {
            c.set(i as f64, 0.0, "t", Point::new(i as f64 * 2.0, 0.0));
        }

        assert_eq!(c.len(), 3);
        assert!(c.get(0.0, 0.0, "t").is_none());
        assert!(c.get(4.0, 0.0, "t").is_some());
        assert!(c.index_is_consistent());
    }

    #[test]
    fn replacing_an_entry_does_not_evict_neighbors() {
        let c = cache(3);
        for i in 0..3 {
            c.set(i as f64, 0.0, "t", Point::new(i as f64, 0.0));
        }
        c.set(1.0, 0.0, "t", Point::new(9.0, 9.0));

        assert_eq!(c.len(), 3);
        assert_eq!(c.get(1.0, 0.0, "t"), Some(Point::new(9.0, 9.0)));
        assert!(c.get(0.0, 0.0, "t").is_some());
        assert!(c.get(2.0, 0.0, "t").is_some());
        assert!(c.index_is_consistent());
    }

    #[test]
    fn nearby_points_filters_by_radius_and_transform() {
        let c = cache(64);
        c.set(0.0, 0.0, "a", Point::new(0.0, 0.0));
        c.set(3.0, 4.0, "a", Point::new(30.0, 40.0));
        c.set(100.0, 100.0, "a", Point::new(1.0, 1.0));
        c.set(1.0, 1.0, "b", Point::new(2.0, 2.0));

        let near = c.nearby_points(0.0, 0.0, 5.0, "a");
        assert_eq!(near.len(), 2);
        assert!(near.iter().any(|n| n.transformed == Point::new(30.0, 40.0)));
        assert!(near.iter().all(|n| n.source.distance_to(Point::ZERO) <= 5.0));
    }

    #[test]
    fn nearby_points_spans_grid_cells() {
        let c = cache(64);
        // Straddle a cell boundary at x = 10.
        c.set(9.5, 0.0, "t", Point::new(1.0, 0.0));
        c.set(10.5, 0.0, "t", Point::new(2.0, 0.0));

        let near = c.nearby_points(10.0, 0.0, 1.0, "t");
        assert_eq!(near.len(), 2);
    }

    #[test]
    fn invalidate_transform_removes_all_entries_and_index_refs() {
        let c = cache(64);
        for i in 0..10 {
            c.set(i as f64, i as f64, "stale", Point::new(0.0, 0.0));
        }
        c.set(1.0, 1.0, "live", Point::new(5.0, 5.0));

        assert_eq!(c.invalidate_transform("stale"), 10);
        assert_eq!(c.len(), 1);
        assert!(c.nearby_points(5.0, 5.0, 1000.0, "stale").is_empty());
        assert!(c.get(1.0, 1.0, "live").is_some());
        assert!(c.index_is_consistent());
    }

    #[test]
    fn negative_coordinates_land_in_negative_cells() {
        let c = cache(64);
        c.set(-15.0, -15.0, "t", Point::new(-1.0, -1.0));

        let near = c.nearby_points(-14.0, -14.0, 3.0, "t");
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].source, Point::new(-15.0, -15.0));
    }

    #[test]
    fn stats_and_clear() {
        let c = cache(8);
        c.set(0.0, 0.0, "t", Point::ZERO);
        let _ = c.get(0.0, 0.0, "t");
        let _ = c.get(9.0, 9.0, "t");

        let stats = c.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);

        c.clear();
        assert!(c.is_empty());
        assert!(c.index_is_consistent());
    }
}
