//! Positional byte access for registered JPEG files.
//!
//! The JPEG restart-marker index (`crate::jpeg`) needs to seek and read from
//! arbitrary offsets in a source file, repeatedly, from both the foreground
//! reader and the background sweep thread. [`PositionalReader`] is the seam:
//! a thin trait over "read `len` bytes at `offset`" so the indexing and
//! synthesis logic can be exercised against an in-memory fixture without
//! touching the filesystem.
//!
//! DICOM files are not read through this trait — `dicom-object` owns its own
//! file I/O internally.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

/// A resource that supports positional reads of a known total size.
///
/// Implementations must be safe to share across threads; callers are
/// expected to serialize access externally when ordering matters (the JPEG
/// backend does this with its slide-wide restart marker mutex, per spec
/// §5).
pub trait PositionalReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    fn read_exact_at(&self, offset: u64, len: usize) -> std::io::Result<Vec<u8>>;

    /// Total size of the resource in bytes.
    fn size(&self) -> u64;
}

/// A [`PositionalReader`] backed by a local file handle.
///
/// Wraps a single `std::fs::File` behind a mutex: POSIX positional reads
/// (`pread`) would avoid the lock, but `std::fs::File` only exposes
/// seek-then-read, and correctness (not raw throughput) is what this engine
/// is built for. Callers that need concurrent access to the same file
/// should open separate handles.
pub struct FileReader {
    file: Mutex<File>,
    size: u64,
}

impl FileReader {
    pub fn open(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            size,
        })
    }
}

impl PositionalReader for FileReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// A [`PositionalReader`] over an in-memory byte buffer, for tests.
#[derive(Debug, Clone)]
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl PositionalReader for MemoryReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let start = offset as usize;
        let end = start
            .checked_add(len)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "read past end of buffer")
            })?;
        Ok(self.data[start..end].to_vec())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
