//! DICOM VL Whole Slide Microscopy Image backend: directory discovery,
//! series/level classification, and per-frame tile decoding.

pub mod dataset;
pub mod file;
pub mod pyramid;

use std::path::Path;

pub use dataset::DicomDataset;
pub use file::DicomFile;
pub use pyramid::{AssociatedImage, DicomLevel, Pyramid};

use crate::error::{DicomError, DicomResult};
use crate::jpeg::{ImageCrateDecoder, JpegDecoder};

/// Open the directory containing `anchor_path` and assemble the pyramid
/// for the series `anchor_path` belongs to (spec §4.5 + §4.6).
pub fn open_series(anchor_path: &Path) -> DicomResult<Pyramid> {
    let dir = anchor_path.parent().ok_or_else(|| DicomError::BadFile {
        path: anchor_path.display().to_string(),
        reason: "anchor path has no parent directory".to_string(),
    })?;
    let candidates = file::scan_directory(dir)?;
    pyramid::assemble_pyramid(candidates, anchor_path)
}

/// Decodes individual DICOM levels' JPEG frames.
pub struct DicomBackend {
    pub pyramid: Pyramid,
    decoder: Box<dyn JpegDecoder>,
}

impl DicomBackend {
    pub fn new(pyramid: Pyramid) -> Self {
        Self::with_decoder(pyramid, Box::new(ImageCrateDecoder))
    }

    pub fn with_decoder(pyramid: Pyramid, decoder: Box<dyn JpegDecoder>) -> Self {
        Self { pyramid, decoder }
    }

    /// Decode tile `(col, row)` of `level`, per spec §4.6 "Per-tile read
    /// path": `frame_number = 1 + col + tiles_across * row`. `level_index`
    /// is carried only to label an out-of-range error with the level it
    /// came from.
    pub fn read_tile(
        &self,
        level_index: usize,
        level: &DicomLevel,
        col: u32,
        row: u32,
    ) -> DicomResult<Vec<u32>> {
        let grid = level.grid();
        let tiles_across = grid.tiles_across();
        let frame_number = 1 + col + tiles_across * row;
        if !grid.in_bounds(col, row) {
            return Err(DicomError::OutOfRange {
                level: level_index,
                frame: frame_number,
                num_frames: grid.tiles_across() * grid.tiles_down(),
            });
        }

        let jpeg_bytes = level
            .file
            .with_dataset(|ds| ds.frame_bytes(level_index, frame_number))??;

        let tile_w = grid.tile_width_at(col);
        let tile_h = grid.tile_height_at(row);

        let pixels = self
            .decoder
            .decode_tile(&jpeg_bytes, level.tile_w, level.tile_h, 1)
            .map_err(|e| DicomError::DecodeFailure {
                frame: frame_number,
                reason: e.to_string(),
            })?;

        if tile_w == level.tile_w && tile_h == level.tile_h {
            return Ok(pixels);
        }

        // clip a partial edge tile down to the level's true extent
        let mut clipped = Vec::with_capacity((tile_w * tile_h) as usize);
        for y in 0..tile_h {
            let row_start = (y * level.tile_w) as usize;
            clipped.extend_from_slice(&pixels[row_start..row_start + tile_w as usize]);
        }
        Ok(clipped)
    }

    pub fn comment(&self) -> Option<&str> {
        None
    }

    /// Decode an associated image (label/macro) in one shot — its single
    /// frame at full resolution, no tiling. Associated images sit outside
    /// the pyramid, so there is no level index to report; `frame_bytes`
    /// is always given frame 1 and an out-of-range frame can't occur here.
    pub fn read_associated(&self, image: &AssociatedImage) -> DicomResult<Vec<u32>> {
        let jpeg_bytes = image.file.with_dataset(|ds| ds.frame_bytes(0, 1))??;
        self.decoder
            .decode_tile(&jpeg_bytes, image.width, image.height, 1)
            .map_err(|e| DicomError::DecodeFailure {
                frame: 1,
                reason: e.to_string(),
            })
    }
}
