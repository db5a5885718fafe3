//! Seam between the pyramid/classification logic and the DICOM parsing
//! library.
//!
//! [`DicomDataset`] abstracts "a parsed DICOM dataset with encapsulated
//! pixel data" behind the handful of operations the rest of this module
//! needs: tag lookups and per-frame JPEG fragment extraction. The
//! production implementation ([`ObjectDataset`]) wraps `dicom-object`; test
//! code uses [`crate::dicom::dataset::test_support::FakeDataset`] instead,
//! the same trait-seam pattern the teacher uses for range-reading
//! (`io::RangeReader`).

use dicom_core::dictionary::DataDictionary;
use dicom_dictionary_std::StandardDataDictionary;

use crate::error::{DicomError, DicomResult};

/// A parsed DICOM dataset, queried by DICOM keyword (e.g.
/// `"TotalPixelMatrixColumns"`, `"ImageType"`).
pub trait DicomDataset: Send + Sync {
    /// String value at `index` of a (possibly multi-valued) element.
    fn get_string(&self, keyword: &str, index: usize) -> Option<String>;

    /// Integer value of a single-valued element.
    fn get_int(&self, keyword: &str) -> Option<i64>;

    /// Declared frame count (`NumberOfFrames`), if present.
    fn num_frames(&self) -> Option<u32>;

    /// Raw bytes of the JPEG-compressed pixel fragment for 1-based
    /// `frame_number`. `level_index` is carried only to label an
    /// out-of-range error with the level it came from.
    fn frame_bytes(&self, level_index: usize, frame_number: u32) -> DicomResult<Vec<u8>>;
}

/// Read a 4-element `ImageType` as an array, for classification
/// (spec §4.6). Returns `None` if any of the four values is missing.
pub fn read_image_type(dataset: &dyn DicomDataset) -> Option<[String; 4]> {
    let v: Vec<String> = (0..4)
        .map(|i| dataset.get_string("ImageType", i))
        .collect::<Option<Vec<_>>>()?;
    Some([
        v[0].clone(),
        v[1].clone(),
        v[2].clone(),
        v[3].clone(),
    ])
}

/// Production [`DicomDataset`] backed by `dicom-object`.
pub struct ObjectDataset {
    obj: dicom_object::FileDicomObject<dicom_object::mem::InMemDicomObject>,
}

impl ObjectDataset {
    pub fn load(path: &str) -> DicomResult<Self> {
        let obj = dicom_object::open_file(path).map_err(|e| DicomError::BadFile {
            path: path.to_string(),
            reason: format!("failed to parse DICOM dataset: {e}"),
        })?;
        Ok(Self { obj })
    }
}

impl DicomDataset for ObjectDataset {
    fn get_string(&self, keyword: &str, index: usize) -> Option<String> {
        // MediaStorageSOPClassUID lives in the file-meta group, not the
        // main dataset, so the dictionary-tag lookup below can't see it.
        if keyword == "MediaStorageSOPClassUID" {
            return (index == 0).then(|| self.obj.meta().media_storage_sop_class_uid.clone());
        }

        let tag = dicom_dictionary_std::StandardDataDictionary
            .by_name(keyword)?
            .tag
            .inner();
        let elem = self.obj.element(tag).ok()?;
        let strings = elem.to_multi_str().ok()?;
        strings.get(index).map(|s| s.trim_end().to_string())
    }

    fn get_int(&self, keyword: &str) -> Option<i64> {
        let tag = dicom_dictionary_std::StandardDataDictionary
            .by_name(keyword)?
            .tag
            .inner();
        let elem = self.obj.element(tag).ok()?;
        elem.to_int::<i64>().ok()
    }

    fn num_frames(&self) -> Option<u32> {
        self.get_int("NumberOfFrames").map(|v| v as u32)
    }

    fn frame_bytes(&self, level_index: usize, frame_number: u32) -> DicomResult<Vec<u8>> {
        let tag = dicom_core::Tag(0x7FE0, 0x0010); // PixelData
        let elem = self.obj.element(tag).map_err(|_| DicomError::BadFile {
            path: String::new(),
            reason: "no PixelData element".to_string(),
        })?;

        let fragments = elem
            .value()
            .fragments()
            .ok_or_else(|| DicomError::BadFile {
                path: String::new(),
                reason: "PixelData is not encapsulated (no fragment sequence)".to_string(),
            })?;

        let num_frames = self.num_frames().unwrap_or(fragments.len() as u32);
        if fragments.len() as u32 != num_frames {
            return Err(DicomError::BadFile {
                path: String::new(),
                reason: format!(
                    "fragment count {} does not match declared frame count {} \
                     (multi-fragment-per-frame Basic Offset Tables are not supported)",
                    fragments.len(),
                    num_frames
                ),
            });
        }

        if frame_number == 0 || frame_number > num_frames {
            return Err(DicomError::OutOfRange {
                level: level_index,
                frame: frame_number,
                num_frames,
            });
        }

        Ok(fragments[(frame_number - 1) as usize].to_vec())
    }
}

/// In-memory [`DicomDataset`] double for tests, kept public (not
/// `#[cfg(test)]`-gated) so integration tests in `tests/` — a separate
/// crate — can build fixtures without a real DICOM parser.
pub mod test_support {
    use super::*;
    use std::collections::HashMap;

    /// In-memory [`DicomDataset`] test double.
    #[derive(Default)]
    pub struct FakeDataset {
        pub strings: HashMap<String, Vec<String>>,
        pub ints: HashMap<String, i64>,
        pub frames: Vec<Vec<u8>>,
    }

    impl DicomDataset for FakeDataset {
        fn get_string(&self, keyword: &str, index: usize) -> Option<String> {
            self.strings.get(keyword)?.get(index).cloned()
        }

        fn get_int(&self, keyword: &str) -> Option<i64> {
            self.ints.get(keyword).copied()
        }

        fn num_frames(&self) -> Option<u32> {
            Some(self.frames.len() as u32)
        }

        fn frame_bytes(&self, level_index: usize, frame_number: u32) -> DicomResult<Vec<u8>> {
            let num_frames = self.frames.len() as u32;
            if frame_number == 0 || frame_number > num_frames {
                return Err(DicomError::OutOfRange {
                    level: level_index,
                    frame: frame_number,
                    num_frames,
                });
            }
            Ok(self.frames[(frame_number - 1) as usize].clone())
        }
    }
}
