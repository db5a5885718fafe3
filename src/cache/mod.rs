//! Bounded tile cache shared by both backends.
//!
//! This is a direct, synchronous reworking of the teacher's encoded-tile
//! cache (`tile::cache::TileCache`): an [`lru::LruCache`] plus a running
//! byte total, evicting least-recently-used entries until the total is back
//! under budget. The key and value shapes differ — spec §3/§4.1 key by
//! `(level identity, col, row)` and store decoded ARGB32 pixel buffers
//! rather than encoded JPEG bytes — but the eviction policy and the
//! size-tracking trick (subtract-then-reinsert on key collision) are
//! unchanged.
//!
//! # Concurrency
//!
//! Spec §4.1 requires `get`/`put` to be atomic with respect to each other,
//! and explicitly allows two readers to race a miss-decode-put sequence for
//! the same key (decode is deterministic, so both puts are idempotent). A
//! single `std::sync::Mutex` around the LRU structure is sufficient and is
//! never held across a decode (spec §5, "Tile cache: internal mutex...
//! Never held across a decode").

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

/// Default cache capacity: 64MB of decoded ARGB32 pixels.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (bounds LRU bookkeeping overhead
/// independent of the byte budget).
const DEFAULT_MAX_ENTRIES: usize = 4096;

/// Identifies one pyramid level for cache-key purposes.
///
/// A raw `usize` level index is not enough: the JPEG backend keeps four
/// `scale_denom` variants that are distinct levels with distinct tile
/// content, and a slide may be closed and reopened. `LevelId` pairs the
/// slide-unique id with the level index so stale entries from a previous
/// slide can never alias a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelId {
    pub slide_id: u64,
    pub level_index: usize,
}

/// Cache key: `(level identity, tile_col, tile_row)`, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub level: LevelId,
    pub col: u32,
    pub row: u32,
}

impl TileKey {
    pub fn new(level: LevelId, col: u32, row: u32) -> Self {
        Self { level, col, row }
    }
}

/// A decoded ARGB32 tile, `tw * th` pixels packed as `0xAARRGGBB`.
///
/// Reference-counted so a reader that obtained a tile via [`TileCache::get`]
/// or [`TileCache::put`] keeps a valid buffer even if the cache evicts its
/// own copy a moment later (spec §3: "Eviction never invalidates a still-
/// referenced tile").
pub type TileBuffer = Arc<Vec<u32>>;

/// Bounded LRU cache of decoded tiles, keyed by `(level, col, row)`.
pub struct TileCache {
    cache: Mutex<LruCache<TileKey, TileBuffer>>,
    max_pixels: usize,
    current_pixels: Mutex<usize>,
}

impl TileCache {
    /// Create a cache with the default byte budget.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a cache with a given byte budget (converted to a pixel budget;
    /// 4 bytes per ARGB32 pixel).
    pub fn with_capacity(max_bytes: usize) -> Self {
        Self::with_capacity_and_entries(max_bytes, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache with a given byte budget and a cap on entry count.
    pub fn with_capacity_and_entries(max_bytes: usize, max_entries: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(max_entries.max(1)).unwrap(),
            )),
            max_pixels: max_bytes / 4,
            current_pixels: Mutex::new(0),
        }
    }

    /// Look up a tile, promoting it to most-recently-used on hit.
    pub fn get(&self, key: &TileKey) -> Option<TileBuffer> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(key).cloned()
    }

    /// Check for a tile without affecting LRU order.
    pub fn contains(&self, key: &TileKey) -> bool {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.contains(key)
    }

    /// Insert a tile, evicting least-recently-used entries until the
    /// running pixel total is back within budget.
    ///
    /// Matches spec §4.1: a key that already exists is replaced, and the
    /// replacement is a plain insertion (no attempt at single-flighting
    /// concurrent decodes of the same key).
    pub fn put(&self, key: TileKey, data: Vec<u32>) -> TileBuffer {
        let data_len = data.len();
        let entry = Arc::new(data);

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let mut current = self.current_pixels.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(old) = cache.peek(&key) {
            *current = current.saturating_sub(old.len());
        }

        cache.put(key, entry.clone());
        *current += data_len;

        while *current > self.max_pixels {
            match cache.pop_lru() {
                Some((_, evicted)) => *current = current.saturating_sub(evicted.len()),
                None => break,
            }
        }

        entry
    }

    /// Remove a tile from the cache, if present.
    pub fn remove(&self, key: &TileKey) -> Option<TileBuffer> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let mut current = self.current_pixels.lock().unwrap_or_else(|e| e.into_inner());
        cache.pop(key).map(|data| {
            *current = current.saturating_sub(data.len());
            data
        })
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let mut current = self.current_pixels.lock().unwrap_or_else(|e| e.into_inner());
        cache.clear();
        *current = 0;
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current total size in bytes (pixels * 4).
    pub fn size_bytes(&self) -> usize {
        *self.current_pixels.lock().unwrap_or_else(|e| e.into_inner()) * 4
    }

    /// Maximum capacity in bytes.
    pub fn capacity_bytes(&self) -> usize {
        self.max_pixels * 4
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}
