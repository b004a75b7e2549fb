//! LRU cache for decoded tiles.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use raster_common::{Raster, Scale};
use serde::{Deserialize, Serialize};

/// Cache key for tiles: (coverage name hash, tile id, decode scale).
pub type TileKey = (u64, i64, Scale);

/// Cache statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub memory_bytes: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bytes held by a decoded tile.
fn raster_size(raster: &Raster) -> usize {
    raster.pixels().len() + raster.mask().map(|m| m.len()).unwrap_or(0)
}

/// LRU cache of decoded tiles with memory-bounded eviction.
pub struct TileCache {
    cache: LruCache<TileKey, Arc<Raster>>,
    memory_limit: usize,
    current_memory: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TileCache {
    /// Create a tile cache with the given memory limit in bytes.
    pub fn new(memory_limit: usize) -> Self {
        // Sized for 256x256 RGB tiles; memory accounting does the real bounding
        let tile_size_estimate = 256 * 256 * 3;
        let max_entries = (memory_limit / tile_size_estimate).max(16);

        Self {
            cache: LruCache::new(NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN)),
            memory_limit,
            current_memory: 0,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a tile, updating LRU order.
    pub fn get(&mut self, key: &TileKey) -> Option<Arc<Raster>> {
        if let Some(tile) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(Arc::clone(tile))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a tile, evicting least recently used tiles to stay in budget.
    ///
    /// Tiles larger than the whole budget are not cached.
    pub fn insert(&mut self, key: TileKey, tile: Arc<Raster>) {
        let size = raster_size(&tile);
        if size > self.memory_limit {
            return;
        }

        if let Some(old) = self.cache.pop(&key) {
            self.current_memory = self.current_memory.saturating_sub(raster_size(&old));
        }

        while self.current_memory + size > self.memory_limit && !self.cache.is_empty() {
            if let Some((_, evicted)) = self.cache.pop_lru() {
                self.current_memory = self.current_memory.saturating_sub(raster_size(&evicted));
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        // The entry bound can evict on its own; keep the accounting in sync
        if let Some((_, evicted)) = self.cache.push(key, tile) {
            self.current_memory = self.current_memory.saturating_sub(raster_size(&evicted));
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.current_memory += size;
    }

    /// Drop every tile of one coverage.
    pub fn invalidate_coverage(&mut self, coverage_hash: u64) -> usize {
        let keys: Vec<TileKey> = self
            .cache
            .iter()
            .filter(|(k, _)| k.0 == coverage_hash)
            .map(|(k, _)| *k)
            .collect();
        for key in &keys {
            if let Some(tile) = self.cache.pop(key) {
                self.current_memory = self.current_memory.saturating_sub(raster_size(&tile));
            }
        }
        keys.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
            memory_bytes: self.current_memory as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.current_memory = 0;
    }

    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Hash of a coverage name, used as the first part of [`TileKey`].
pub fn hash_coverage(name: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}
