//! Cache entry bookkeeping shared by the transform and point caches

use std::time::{Duration, Instant};

/// A cached value plus the metadata the eviction policies need.
#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: Instant,
    pub last_access: Instant,
    pub access_count: u64,
    pub size_hint: usize,
    pub ttl: Option<Duration>,
    /// Owner-assigned generation tag; entries tagged at or below an
    /// invalidated generation are dropped on the next sweep.
    pub generation: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, size_hint: usize, ttl: Option<Duration>, generation: u64) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            last_access: now,
            access_count: 0,
            size_hint,
            ttl,
            generation,
        }
    }

    /// Record a hit: bump the access count and refresh the access time.
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_access = Instant::now();
    }

    /// TTL check, evaluated lazily at lookup time.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(self.created_at) >= ttl,
            None => false,
        }
    }
}

/// Counters exposed by every cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub memory_used: usize,
}

impl CacheStats {
    /// Hit rate in `[0, 1]`; `0` before any lookup.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Merge counters from another cache into this aggregate.
    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.evictions += other.evictions;
        self.entries += other.entries;
        self.memory_used += other.memory_used;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_updates_count_and_access_time() {
        let mut entry = CacheEntry::new(42_u32, 16, None, 0);
        let before = entry.last_access;
        entry.touch();
        entry.touch();
        assert_eq!(entry.access_count, 2);
        assert!(entry.last_access >= before);
    }

    #[test]
    fn ttl_expiry_is_lazy() {
        let entry = CacheEntry::new((), 1, Some(Duration::from_millis(0)), 0);
        assert!(entry.is_expired(Instant::now()));

        let eternal = CacheEntry::new((), 1, None, 0);
        assert!(!eternal.is_expired(Instant::now()));
    }

    #[test]
    fn hit_rate_handles_empty_counters() {
        let mut stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);

        stats.hits = 3;
        stats.misses = 1;
        assert!((stats.hit_rate() - 0.75).abs() < 1e-12);
    }
}
