//! Bounded, thread-safe caches for computed transforms and points
//!
//! Both caches follow the same shape: an LRU access-order list from the `lru`
//! crate, per-entry metadata for TTL/age/frequency decisions, and an internal
//! mutex so they can be shared with the background cleanup worker.

mod entry;
mod manager;
mod point_cache;
mod transform_cache;

pub use entry::{CacheEntry, CacheStats};
pub use manager::{CacheManager, ManagedCache};
pub use point_cache::{NearbyPoint, PointCache, PointCacheConfig};
pub use transform_cache::{TransformCache, TransformCacheConfig};
