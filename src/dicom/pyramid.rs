//! DICOM series grouping, level/associated-image classification, and
//! pyramid assembly.
//!
//! Ports `is_type`, `level_new`, `find_largest`/`set_downsample`, and
//! `remove_bad_level` from `openslide-vendor-dicom.c` (spec §4.6), plus the
//! associated-image classification the same source leaves commented out
//! (`find_associated`) — supplemented here per spec's Non-goals, which
//! scope out other vendor formats but not this backend's own associated
//! images.

use std::sync::Arc;

use crate::dicom::dataset::read_image_type;
use crate::dicom::file::DicomFile;
use crate::error::{DicomError, DicomResult};
use crate::grid::Grid;

/// `ImageType` combinations accepted for pyramid levels.
const LEVEL_TYPES: [[&str; 4]; 2] = [
    ["ORIGINAL", "PRIMARY", "VOLUME", "NONE"],
    ["DERIVED", "PRIMARY", "VOLUME", "RESAMPLED"],
];

/// `ImageType` combinations accepted for associated images, each paired
/// with the property name it is exposed under.
const ASSOCIATED_TYPES: [([&str; 4], &str); 2] = [
    (["ORIGINAL", "PRIMARY", "LABEL", "NONE"], "label"),
    (["ORIGINAL", "PRIMARY", "OVERVIEW", "NONE"], "macro"),
];

fn matches_type(image_type: &[String; 4], allowed: &[&str; 4]) -> bool {
    image_type.iter().zip(allowed.iter()).all(|(a, b)| a == b)
}

/// One classified pyramid level.
pub struct DicomLevel {
    pub file: Arc<DicomFile>,
    pub width: u32,
    pub height: u32,
    pub tile_w: u32,
    pub tile_h: u32,
    /// Integer-division downsample relative to level 0 (spec §4.6 step 4:
    /// "matches source behavior").
    pub downsample: u32,
}

impl DicomLevel {
    pub fn grid(&self) -> Grid {
        Grid::new(self.width, self.height, self.tile_w, self.tile_h)
    }
}

/// A non-pyramidal associated image (label or macro/overview), decoded in
/// one shot rather than tiled.
pub struct AssociatedImage {
    pub file: Arc<DicomFile>,
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Try to classify `file` as a pyramid level. Returns `Ok(None)` (not an
/// error) when the file's `ImageType`/tag shape doesn't match — mirroring
/// `level_new` returning `NULL` for a non-level file without failing the
/// whole open.
fn try_classify_level(file: &Arc<DicomFile>) -> DicomResult<Option<DicomLevel>> {
    file.with_dataset(|ds| {
        let image_type = match read_image_type(ds) {
            Some(t) => t,
            None => return Ok(None),
        };
        if !LEVEL_TYPES.iter().any(|t| matches_type(&image_type, t)) {
            return Ok(None);
        }

        let width = ds.get_int("TotalPixelMatrixColumns");
        let height = ds.get_int("TotalPixelMatrixRows");
        let tile_w = ds.get_int("Columns");
        let tile_h = ds.get_int("Rows");

        let (width, height, tile_w, tile_h) = match (width, height, tile_w, tile_h) {
            (Some(w), Some(h), Some(tw), Some(th)) => (w, h, tw, th),
            _ => {
                return Err(DicomError::BadFile {
                    path: file.path.display().to_string(),
                    reason: "missing TotalPixelMatrixColumns/Rows or Columns/Rows".to_string(),
                })
            }
        };

        if tile_w != tile_h {
            return Err(DicomError::BadFile {
                path: file.path.display().to_string(),
                reason: format!("non-square tiles ({tile_w}x{tile_h})"),
            });
        }

        Ok(Some(DicomLevel {
            file: file.clone(),
            width: width as u32,
            height: height as u32,
            tile_w: tile_w as u32,
            tile_h: tile_h as u32,
            downsample: 1,
        }))
    })?
}

fn try_classify_associated(file: &Arc<DicomFile>) -> DicomResult<Option<AssociatedImage>> {
    file.with_dataset(|ds| {
        let image_type = match read_image_type(ds) {
            Some(t) => t,
            None => return None,
        };
        let (_, name) = ASSOCIATED_TYPES
            .iter()
            .find(|(t, _)| matches_type(&image_type, t))?;
        let width = ds.get_int("Columns")?;
        let height = ds.get_int("Rows")?;
        Some(AssociatedImage {
            file: file.clone(),
            name,
            width: width as u32,
            height: height as u32,
        })
    })
}

fn series_uid(file: &DicomFile) -> DicomResult<Option<String>> {
    file.with_dataset(|ds| ds.get_string("SeriesInstanceUID", 0))
}

/// Result of grouping and classifying a directory's candidate files
/// against the series identified by `anchor_path` (spec §4.6 step 1).
pub struct Pyramid {
    /// Levels, sorted by `width` descending (level 0 = highest resolution).
    pub levels: Vec<DicomLevel>,
    pub associated: Vec<AssociatedImage>,
    pub series_uid: String,
}

/// Build the pyramid for the series that `anchor_path` belongs to, out of
/// `candidates` (every file `scan_directory` accepted).
pub fn assemble_pyramid(
    candidates: Vec<DicomFile>,
    anchor_path: &std::path::Path,
) -> DicomResult<Pyramid> {
    let candidates: Vec<Arc<DicomFile>> = candidates.into_iter().map(Arc::new).collect();

    let anchor = candidates
        .iter()
        .find(|f| f.path.as_path() == anchor_path)
        .ok_or_else(|| DicomError::BadFile {
            path: anchor_path.display().to_string(),
            reason: "anchor file was not among the accepted DICOM candidates".to_string(),
        })?;
    let target_series = series_uid(anchor)?.ok_or_else(|| DicomError::BadFile {
        path: anchor_path.display().to_string(),
        reason: "missing SeriesInstanceUID".to_string(),
    })?;

    let mut same_series = Vec::new();
    for file in &candidates {
        if series_uid(file)?.as_deref() == Some(target_series.as_str()) {
            same_series.push(file.clone());
        }
    }

    let mut levels = Vec::new();
    let mut associated = Vec::new();
    for file in &same_series {
        if let Some(level) = try_classify_level(file)? {
            levels.push(level);
            continue;
        }
        if let Some(image) = try_classify_associated(file)? {
            associated.push(image);
        }
    }

    if levels.is_empty() {
        return Err(DicomError::NoLevelsFound {
            series_uid: target_series,
        });
    }

    levels.sort_by(|a, b| b.width.cmp(&a.width));
    let level0_width = levels[0].width;
    for level in &mut levels {
        level.downsample = level0_width / level.width;
    }

    Ok(Pyramid {
        levels,
        associated,
        series_uid: target_series,
    })
}

/// Derive `openslide.mpp-x`/`openslide.mpp-y` from the level-0 file's
/// top-level `PixelSpacing` tag (0028,0030), in millimeters, converted to
/// microns. Some vendors place `PixelSpacing` instead under
/// `SharedFunctionalGroupsSequence/PixelMeasuresSequence`; that nested
/// location is not read. Returns `None` rather than fabricating a value
/// when the top-level tag is absent, per spec §6: "at least ... when
/// derivable from metadata".
pub fn mpp_properties(level0: &DicomLevel) -> DicomResult<Option<(f64, f64)>> {
    level0.file.with_dataset(|ds| {
        let row_spacing = ds.get_string("PixelSpacing", 0);
        let col_spacing = ds.get_string("PixelSpacing", 1);

        let parsed = match (row_spacing, col_spacing) {
            (Some(r), Some(c)) => Some((r, c)),
            _ => None,
        };

        parsed.and_then(|(r, c)| {
            let mm_y: f64 = r.trim().parse().ok()?;
            let mm_x: f64 = c.trim().parse().ok()?;
            // PixelSpacing is (row spacing, column spacing) in mm;
            // mpp is micrometers per pixel.
            Some((mm_x * 1000.0, mm_y * 1000.0))
        })
    })
}
