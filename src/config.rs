//! Engine-wide tunables.
//!
//! There is no CLI/env layer — the public slide-open API and its
//! configuration surface are external collaborators (spec §6). What
//! remains here mirrors the teacher's own compile-time defaults
//! (`DEFAULT_BLOCK_SIZE`, `DEFAULT_*_CAPACITY`) plus the constructor
//! overloads `TileCache` already exposes.

use crate::cache::DEFAULT_TILE_CACHE_CAPACITY;

/// Bytes read per chunk while scanning forward for restart markers
/// (spec §4.3: "Scan forward reading chunks (typical 4 KiB)").
pub const DEFAULT_SWEEP_CHUNK_SIZE: usize = 4096;

/// Engine-wide settings a caller can override when opening a slide.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub tile_cache_capacity_bytes: usize,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tile_cache_capacity(mut self, bytes: usize) -> Self {
        self.tile_cache_capacity_bytes = bytes;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_cache_capacity_bytes: DEFAULT_TILE_CACHE_CAPACITY,
        }
    }
}
