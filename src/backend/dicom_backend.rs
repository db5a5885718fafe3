//! [`Backend`] adapter over the DICOM VL Whole Slide Microscopy Image
//! pyramid.

use crate::backend::Backend;
use crate::dicom::DicomBackend;
use crate::error::EngineResult;
use crate::grid::Grid;

pub struct DicomBackendAdapter {
    inner: DicomBackend,
}

impl DicomBackendAdapter {
    pub fn new(inner: DicomBackend) -> Self {
        Self { inner }
    }

    pub fn series_uid(&self) -> &str {
        &self.inner.pyramid.series_uid
    }

    pub fn associated_images(&self) -> &[crate::dicom::AssociatedImage] {
        &self.inner.pyramid.associated
    }
}

impl Backend for DicomBackendAdapter {
    fn num_levels(&self) -> usize {
        self.inner.pyramid.levels.len()
    }

    fn level_dimensions(&self, level_index: usize) -> (u32, u32) {
        match self.inner.pyramid.levels.get(level_index) {
            Some(level) => (level.width, level.height),
            None => (0, 0),
        }
    }

    fn level_grid(&self, level_index: usize) -> Option<Grid> {
        self.inner.pyramid.levels.get(level_index).map(|l| l.grid())
    }

    fn downsample(&self, level_index: usize) -> Option<f64> {
        self.inner
            .pyramid
            .levels
            .get(level_index)
            .map(|l| l.downsample as f64)
    }

    fn decode_tile(&self, level_index: usize, col: u32, row: u32) -> EngineResult<Vec<u32>> {
        let level = self.inner.pyramid.levels.get(level_index).ok_or(
            crate::error::EngineError::LevelOutOfRange(
                level_index,
                self.inner.pyramid.levels.len(),
            ),
        )?;
        Ok(self.inner.read_tile(level_index, level, col, row)?)
    }

    fn comment(&self) -> Option<String> {
        self.inner.comment().map(|s| s.to_string())
    }
}
