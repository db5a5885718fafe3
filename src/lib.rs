//! # wsi-tile-engine
//!
//! The pyramidal tile engine at the core of a whole-slide-image (WSI)
//! reading library: a bounded tile cache and tile grid shared by two
//! backends.
//!
//! - **JPEG mosaic** - a slide stored as a grid of ordinary JPEG files,
//!   each holding many internally-addressable tiles separated by restart
//!   markers. [`jpeg`] indexes every restart marker, synthesizes a minimal
//!   valid JPEG stream per tile on demand, and decodes it with
//!   `scale_denom` downsampling while a background thread progressively
//!   densifies the index.
//! - **DICOM VL Whole Slide Microscopy Image** - a slide stored as a
//!   directory of DICOM files, each one pyramid level or an associated
//!   label/overview image. [`dicom`] groups files by series, classifies
//!   each by `ImageType`, assembles the pyramid by image width, and
//!   decodes the JPEG-compressed frame addressed by each tile.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`cache`] - bounded LRU tile cache keyed by `(level, col, row)`
//! - [`grid`] - tile grid geometry and the region painter
//! - [`jpeg`] - restart-marker index, mosaic level assembly, decoding
//! - [`dicom`] - file loader, series/level classification, frame decoding
//! - [`backend`] - the `Backend` trait both engines implement
//! - [`slide`] - the `Slide` handle tying a backend to a cache
//! - [`io`] - the `PositionalReader` seam both backends read bytes through
//! - [`config`] - engine-wide tunables
//! - [`error`] - layered error types for both backends
//!
//! Vendor-format detection, the public slide-open dispatcher across
//! formats, CLI tooling, and the surface a caller composites tiles onto
//! are external collaborators and out of scope for this crate (spec §1
//! Non-goals).
//!
//! ## Example
//!
//! ```no_run
//! use wsi_tile_engine::{EngineConfig, Slide};
//! use std::path::Path;
//!
//! let slide = Slide::open_dicom(Path::new("/slides/series/level0.dcm"), EngineConfig::new())
//!     .expect("failed to open DICOM series");
//! let (w, h) = slide.level_dimensions(0);
//! let tile = slide.paint_region(0, 0, 0, w.min(256), h.min(256));
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod dicom;
pub mod error;
pub mod grid;
pub mod io;
pub mod jpeg;
pub mod slide;

pub use backend::Backend;
pub use cache::{LevelId, TileBuffer, TileCache, TileKey};
pub use config::EngineConfig;
pub use error::{DicomError, DicomResult, EngineError, EngineResult, JpegError, JpegResult};
pub use grid::{Grid, Region, TileSource};
pub use slide::{AssociatedImage, Slide};
