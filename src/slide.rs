//! `Slide`: the process-unique handle owning a pyramid's levels, tile
//! cache, associated images, and properties (spec §3 "Slide").

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{Backend, DicomBackendAdapter, JpegBackendAdapter};
use crate::cache::TileCache;
use crate::config::EngineConfig;
use crate::dicom::{self, DicomBackend};
use crate::error::{DicomResult, EngineResult};
use crate::grid::Region;
use crate::jpeg::{JpegFragment, JpegMosaicBackend};

static NEXT_SLIDE_ID: AtomicU64 = AtomicU64::new(1);

/// A decoded, non-pyramidal image associated with a slide (label, macro,
/// thumbnail).
pub struct AssociatedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

/// A process-unique handle over a pyramid, however it is backed.
///
/// Created by [`Slide::open_jpeg_mosaic`] or [`Slide::open_dicom`];
/// destroyed by ordinary drop (`TileCache`, the backend, and any
/// background sweep thread are all released through `Drop`, per spec §3
/// "Lifetime").
pub struct Slide {
    id: u64,
    backend: Box<dyn Backend>,
    cache: TileCache,
    associated_images: HashMap<String, AssociatedImage>,
    properties: HashMap<String, String>,
}

impl Slide {
    /// Open a JPEG-mosaic slide from a zxy-ordered fragment registration
    /// list (spec §4.4).
    pub fn open_jpeg_mosaic(fragments: Vec<JpegFragment>, config: EngineConfig) -> Self {
        let jpeg_backend = JpegMosaicBackend::new(fragments, Box::new(crate::jpeg::ImageCrateDecoder));
        let comment = jpeg_backend.comment().map(|s| s.to_string());
        let backend = Box::new(JpegBackendAdapter::new(jpeg_backend));

        let mut properties = HashMap::new();
        if let Some(comment) = &comment {
            properties.insert("openslide.comment".to_string(), comment.clone());
        }

        Self {
            id: NEXT_SLIDE_ID.fetch_add(1, Ordering::Relaxed),
            backend,
            cache: TileCache::with_capacity(config.tile_cache_capacity_bytes),
            associated_images: HashMap::new(),
            properties,
        }
    }

    /// Open a DICOM VL Whole Slide Microscopy Image series, given any one
    /// file belonging to it (spec §4.5 + §4.6).
    pub fn open_dicom(anchor_path: &Path, config: EngineConfig) -> DicomResult<Self> {
        let pyramid = dicom::open_series(anchor_path)?;

        let mut properties = HashMap::new();
        properties.insert("openslide.series-uid".to_string(), pyramid.series_uid.clone());
        if let Some((mpp_x, mpp_y)) = dicom::pyramid::mpp_properties(&pyramid.levels[0])? {
            properties.insert("openslide.mpp-x".to_string(), mpp_x.to_string());
            properties.insert("openslide.mpp-y".to_string(), mpp_y.to_string());
        }

        let dicom_backend = DicomBackend::new(pyramid);

        let mut associated_images = HashMap::new();
        for image in dicom_backend.pyramid.associated.iter() {
            let name = image.name.to_string();
            let width = image.width;
            let height = image.height;
            if let Ok(pixels) = dicom_backend.read_associated(image) {
                associated_images.insert(
                    name,
                    AssociatedImage {
                        width,
                        height,
                        pixels,
                    },
                );
            }
        }

        let backend = Box::new(DicomBackendAdapter::new(dicom_backend));

        Ok(Self {
            id: NEXT_SLIDE_ID.fetch_add(1, Ordering::Relaxed),
            backend,
            cache: TileCache::with_capacity(config.tile_cache_capacity_bytes),
            associated_images,
            properties,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.backend.num_levels()
    }

    /// Returns `(0, 0)` for an out-of-range index, per spec §6.
    pub fn level_dimensions(&self, level_index: usize) -> (u32, u32) {
        self.backend.level_dimensions(level_index)
    }

    pub fn downsample(&self, level_index: usize) -> Option<f64> {
        self.backend.downsample(level_index)
    }

    pub fn comment(&self) -> Option<String> {
        self.properties.get("openslide.comment").cloned()
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn associated_image(&self, name: &str) -> Option<&AssociatedImage> {
        self.associated_images.get(name)
    }

    pub fn associated_image_names(&self) -> impl Iterator<Item = &str> {
        self.associated_images.keys().map(|s| s.as_str())
    }

    /// `paint_region(slide, target_surface, x, y, level_index, w, h)` from
    /// spec §6, with `x, y` in level-0 coordinates — divided here by the
    /// level's own downsample before dispatching to the backend.
    pub fn paint_region(
        &self,
        level_index: usize,
        level0_x: i64,
        level0_y: i64,
        w: u32,
        h: u32,
    ) -> EngineResult<Vec<u32>> {
        let mut dst = vec![0u32; (w * h) as usize];
        let downsample = match self.downsample(level_index) {
            Some(d) => d,
            None => return Ok(dst),
        };

        let x = (level0_x as f64 / downsample).max(0.0) as u32;
        let y = (level0_y as f64 / downsample).max(0.0) as u32;

        self.backend
            .paint_region(&self.cache, self.id, level_index, Region { x, y, w, h }, &mut dst)?;
        Ok(dst)
    }

    pub fn cache_size_bytes(&self) -> usize {
        self.cache.size_bytes()
    }
}
