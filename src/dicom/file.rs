//! Candidate DICOM file loading.
//!
//! Port of `dicom_file_new`/`dicom_detect` in `openslide-vendor-dicom.c`:
//! open every regular file in a directory, keep only those whose
//! file-meta `MediaStorageSOPClassUID` matches VL Whole Slide Microscopy
//! Image Storage, and defer reading the full dataset until the caller
//! actually needs pyramid/classification data (spec §4.5 step 3).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use walkdir::WalkDir;

use crate::dicom::dataset::{DicomDataset, ObjectDataset};
use crate::error::{DicomError, DicomResult};

/// SOP Class UID for VL Whole Slide Microscopy Image Storage.
pub const VL_WHOLE_SLIDE_MICROSCOPY_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.77.1.6";

/// One candidate DICOM file: accepted at the file-meta level, with the
/// full dataset loaded lazily and guarded by a per-file mutex (spec §5:
/// "one mutex per `DicomFile` guards calls into the DICOM library's
/// per-file state ... Different files proceed in parallel").
pub struct DicomFile {
    pub path: PathBuf,
    state: Mutex<Option<Box<dyn DicomDataset>>>,
}

impl DicomFile {
    /// Open `path` and check its file-meta SOP class. Returns `Ok(None)`
    /// (not an error) for files that are not DICOM or not this SOP class —
    /// mirroring `dicom_file_new`'s "just skip it" behavior during
    /// directory scan.
    pub fn open_candidate(path: &Path) -> DicomResult<Option<Self>> {
        let path_str = path.to_string_lossy().to_string();
        let dataset = match ObjectDataset::load(&path_str) {
            Ok(d) => d,
            Err(_) => return Ok(None),
        };

        // MediaStorageSOPClassUID lives in the file-meta group; ObjectDataset
        // reads it the same way as any other element.
        let sop_class = dataset.get_string("MediaStorageSOPClassUID", 0);
        if sop_class.as_deref() != Some(VL_WHOLE_SLIDE_MICROSCOPY_IMAGE_STORAGE) {
            return Ok(None);
        }

        Ok(Some(Self {
            path: path.to_path_buf(),
            state: Mutex::new(Some(Box::new(dataset))),
        }))
    }

    /// Run `f` against this file's dataset, serialized against every other
    /// call on the same file.
    pub fn with_dataset<T>(&self, f: impl FnOnce(&dyn DicomDataset) -> T) -> DicomResult<T> {
        let guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let dataset = guard.as_deref().ok_or_else(|| DicomError::BadFile {
            path: self.path.display().to_string(),
            reason: "dataset unavailable".to_string(),
        })?;
        Ok(f(dataset))
    }

    /// Build a `DicomFile` directly from an in-memory dataset double,
    /// bypassing file-meta SOP-class detection — used by tests, including
    /// integration tests in the separate `tests/` crate.
    pub fn from_dataset_for_test(path: PathBuf, dataset: Box<dyn DicomDataset>) -> Self {
        Self {
            path,
            state: Mutex::new(Some(dataset)),
        }
    }
}

/// Scan `dir` non-recursively for candidate DICOM files, per spec §4.5:
/// "For each regular file in the directory". Files that fail to parse or
/// don't match the SOP class are silently skipped, not errors.
pub fn scan_directory(dir: &Path) -> DicomResult<Vec<DicomFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| DicomError::Io {
            path: dir.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        if let Some(file) = DicomFile::open_candidate(entry.path())? {
            files.push(file);
        }
    }

    Ok(files)
}
