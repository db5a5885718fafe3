//! Backend-agnostic operations table (spec §6).
//!
//! A [`Backend`] is whatever a `Slide` dispatches `paint_region`,
//! `get_dimensions`, and `get_comment` to — the JPEG mosaic or the DICOM
//! series. Region painting always goes through the shared [`TileCache`]
//! and [`crate::grid::paint_region`]; only the cache-miss decode path
//! differs between backends.

pub mod dicom_backend;
pub mod jpeg_backend;

pub use dicom_backend::DicomBackendAdapter;
pub use jpeg_backend::JpegBackendAdapter;

use crate::cache::{LevelId, TileCache, TileKey};
use crate::error::EngineResult;
use crate::grid::{paint_region as paint_region_impl, Grid, Region, TileSource};

/// Uniform operations a pyramid-level source exposes to `Slide`.
pub trait Backend: Send + Sync {
    fn num_levels(&self) -> usize;

    /// Returns `(0, 0)` for an out-of-range index, per spec §6.
    fn level_dimensions(&self, level_index: usize) -> (u32, u32);

    fn level_grid(&self, level_index: usize) -> Option<Grid>;

    fn downsample(&self, level_index: usize) -> Option<f64>;

    /// Decode one tile, bypassing the cache (callers go through
    /// [`Backend::paint_region`], which consults the cache first).
    fn decode_tile(&self, level_index: usize, col: u32, row: u32) -> EngineResult<Vec<u32>>;

    /// First file's embedded comment, if any.
    fn comment(&self) -> Option<String>;

    /// Paint `region` (level-own pixel coordinates) of `level_index` into
    /// `dst`, consulting `cache` for each tile before decoding.
    fn paint_region(
        &self,
        cache: &TileCache,
        slide_id: u64,
        level_index: usize,
        region: Region,
        dst: &mut [u32],
    ) -> EngineResult<()> {
        let grid = match self.level_grid(level_index) {
            Some(g) => g,
            None => return Ok(()),
        };
        let source = CachingTileSource {
            cache,
            level: LevelId {
                slide_id,
                level_index,
            },
            backend: self,
        };
        paint_region_impl(&grid, &source, region, dst)
    }
}

/// Adapts a `Backend`'s miss-path decode into the [`TileSource`] callback
/// [`crate::grid::paint_region`] expects, transparently populating `cache`
/// on miss.
struct CachingTileSource<'a> {
    cache: &'a TileCache,
    level: LevelId,
    backend: &'a dyn Backend,
}

impl TileSource for CachingTileSource<'_> {
    fn fetch_tile(&self, col: u32, row: u32) -> EngineResult<Option<Vec<u32>>> {
        let key = TileKey::new(self.level, col, row);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Some((*hit).clone()));
        }

        let pixels = self.backend.decode_tile(self.level.level_index, col, row)?;
        self.cache.put(key, pixels.clone());
        Ok(Some(pixels))
    }
}
