//! [`Backend`] adapter over the JPEG mosaic engine.

use crate::backend::Backend;
use crate::error::EngineResult;
use crate::grid::Grid;
use crate::jpeg::JpegMosaicBackend;

pub struct JpegBackendAdapter {
    inner: JpegMosaicBackend,
}

impl JpegBackendAdapter {
    pub fn new(inner: JpegMosaicBackend) -> Self {
        Self { inner }
    }
}

impl Backend for JpegBackendAdapter {
    fn num_levels(&self) -> usize {
        self.inner.levels.len()
    }

    fn level_dimensions(&self, level_index: usize) -> (u32, u32) {
        match self.inner.levels.get(level_index) {
            Some(level) => (level.pixel_w, level.pixel_h),
            None => (0, 0),
        }
    }

    fn level_grid(&self, level_index: usize) -> Option<Grid> {
        self.inner.levels.get(level_index).map(|l| l.grid())
    }

    fn downsample(&self, level_index: usize) -> Option<f64> {
        self.inner
            .levels
            .get(level_index)
            .map(|l| l.no_scale_denom_downsample)
    }

    fn decode_tile(&self, level_index: usize, col: u32, row: u32) -> EngineResult<Vec<u32>> {
        let level = self
            .inner
            .levels
            .get(level_index)
            .ok_or(crate::error::EngineError::LevelOutOfRange(
                level_index,
                self.inner.levels.len(),
            ))?;
        Ok(self.inner.read_tile(level_index, level, col, row)?)
    }

    fn comment(&self) -> Option<String> {
        self.inner.comment().map(|s| s.to_string())
    }
}
