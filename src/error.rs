//! Error types surfaced to callers of the engine.
//!
//! Errors are layered the way the rest of the crate is layered: a narrow
//! leaf error per subsystem (`JpegError`, `DicomError`), composed into the
//! top-level [`EngineError`] that backend operations return. Structural
//! invariant violations — a caller registering JPEG fragments out of
//! zxy-successor order, a synthesized tile buffer whose penultimate byte
//! isn't `0xFF` — are not represented here at all: they are programmer
//! errors in the caller and are enforced with `assert!`/`debug_assert!` at
//! the point of violation, matching the source library's use of `g_assert`.

use thiserror::Error;

/// Errors from the JPEG-mosaic backend.
#[derive(Debug, Error)]
pub enum JpegError {
    /// A registered file could not be parsed as a baseline JPEG with a
    /// non-zero restart interval.
    #[error("malformed JPEG file {path}: {reason}")]
    BadFile { path: String, reason: String },

    /// A `(level, col, row)` lookup fell outside the known tile grid.
    #[error("tile ({col}, {row}) out of range for level {level} ({tiles_across}x{tiles_down} tiles)")]
    OutOfRange {
        level: usize,
        col: u32,
        row: u32,
        tiles_across: u32,
        tiles_down: u32,
    },

    /// A read or seek against a registered JPEG file failed.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The downstream JPEG decoder rejected the synthesized tile stream.
    #[error("JPEG decode failed for tile ({col}, {row}) at scale_denom {scale_denom}: {reason}")]
    DecodeFailure {
        col: u32,
        row: u32,
        scale_denom: u8,
        reason: String,
    },
}

/// Errors from the DICOM VL Whole Slide Microscopy Image backend.
#[derive(Debug, Error)]
pub enum DicomError {
    /// A candidate file failed the SOP class check, was missing a required
    /// tag, or declared non-square tiles.
    #[error("malformed DICOM file {path}: {reason}")]
    BadFile { path: String, reason: String },

    /// A frame or level index fell outside the known bounds.
    #[error("frame {frame} out of range (1..={num_frames}) for level {level}")]
    OutOfRange {
        level: usize,
        frame: u32,
        num_frames: u32,
    },

    /// Directory scan or file read failed.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The frame's JPEG payload failed to decode.
    #[error("JPEG decode failed for frame {frame}: {reason}")]
    DecodeFailure { frame: u32, reason: String },

    /// No DICOM files in the directory matched the requested series.
    #[error("no pyramid levels found for series {series_uid}")]
    NoLevelsFound { series_uid: String },
}

/// Top-level error returned by backend operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Jpeg(#[from] JpegError),

    #[error(transparent)]
    Dicom(#[from] DicomError),

    /// A level index passed to a backend-agnostic operation was out of range.
    #[error("level {0} out of range (slide has {1} levels)")]
    LevelOutOfRange(usize, usize),
}

pub type JpegResult<T> = Result<T, JpegError>;
pub type DicomResult<T> = Result<T, DicomError>;
pub type EngineResult<T> = Result<T, EngineError>;
