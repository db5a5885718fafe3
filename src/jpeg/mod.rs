//! JPEG-mosaic backend: restart-marker indexing, mosaic level assembly,
//! and the background sweep that progressively densifies the index.

pub mod decode;
pub mod markers;
pub mod mosaic;
pub mod restart_index;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub use decode::{ImageCrateDecoder, JpegDecoder};
pub use mosaic::{assemble_levels, JpegFragment, JpegMosaicLevel};
pub use restart_index::OneJpeg;

use crate::error::{JpegError, JpegResult};

/// All state shared by a JPEG-mosaic slide's levels: the registered file
/// set, the coarse region-read mutex, and the background sweep handle.
///
/// Spec §5: "one mutex per slide (`restart_marker_mutex`) guards the
/// ENTIRE region-read path and the background sweep. This is coarse by
/// design: it also serializes positional file access on shared JPEG file
/// handles."
pub struct JpegMosaicBackend {
    pub levels: Vec<Arc<JpegMosaicLevel>>,
    all_jpegs: Vec<Arc<OneJpeg>>,
    decoder: Box<dyn JpegDecoder>,
    /// Guards every positional read against every `OneJpeg` in
    /// `all_jpegs`, foreground or background. Shared with the sweep
    /// thread via `Arc` so it takes and releases the same lock the
    /// foreground read path uses.
    region_read_mutex: Arc<Mutex<()>>,
    sweep_should_terminate: Arc<AtomicBool>,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
}

impl JpegMosaicBackend {
    /// Assemble levels from `fragments` and spawn the background restart-
    /// marker sweep over every distinct registered file.
    pub fn new(fragments: Vec<JpegFragment>, decoder: Box<dyn JpegDecoder>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let all_jpegs: Vec<Arc<OneJpeg>> = fragments
            .iter()
            .filter(|frag| seen.insert(Arc::as_ptr(&frag.jpeg) as usize))
            .map(|frag| frag.jpeg.clone())
            .collect();

        let levels = assemble_levels(fragments);

        let backend = Self {
            levels,
            all_jpegs,
            decoder,
            region_read_mutex: Arc::new(Mutex::new(())),
            sweep_should_terminate: Arc::new(AtomicBool::new(false)),
            sweep_handle: Mutex::new(None),
        };
        backend.start_sweep();
        backend
    }

    fn start_sweep(&self) {
        let jpegs = self.all_jpegs.clone();
        let terminate = self.sweep_should_terminate.clone();
        let region_read_mutex = self.region_read_mutex.clone();
        let handle =
            std::thread::spawn(move || sweep_restart_markers(jpegs, terminate, region_read_mutex));
        *self.sweep_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Decode one tile at `(level, col, row)`. `level_index` is carried
    /// only to label an out-of-range error with the level it came from.
    pub fn read_tile(
        &self,
        level_index: usize,
        level: &JpegMosaicLevel,
        col: u32,
        row: u32,
    ) -> JpegResult<Vec<u32>> {
        let grid = level.grid();
        if !grid.in_bounds(col, row) {
            return Err(JpegError::OutOfRange {
                level: level_index,
                col,
                row,
                tiles_across: grid.tiles_across(),
                tiles_down: grid.tiles_down(),
            });
        }
        let tile_w = grid.tile_width_at(col);
        let tile_h = grid.tile_height_at(row);

        let _guard = self.region_read_mutex.lock().unwrap_or_else(|e| e.into_inner());

        let (jpeg, within_x, within_y) =
            level.locate(col * grid.tile_w, row * grid.tile_h);

        let tile_col = within_x / jpeg.tile_width;
        let tile_row = within_y / jpeg.tile_height;
        let stride_in_tiles = jpeg.width / jpeg.tile_width;
        let mcu_start = (tile_row * stride_in_tiles + tile_col) as usize;

        let stream = jpeg.synthesize_tile_stream(mcu_start)?;
        self.decoder
            .decode_tile(&stream, jpeg.tile_width, jpeg.tile_height, level.scale_denom)
            .map(|pixels| {
                debug_assert_eq!(pixels.len(), (tile_w * tile_h) as usize);
                pixels
            })
    }

    /// The first registered JPEG's COM comment, if any — the slide's
    /// single comment property (spec: `get_comment` reads `all_jpegs[0]`).
    pub fn comment(&self) -> Option<&str> {
        self.all_jpegs.first().and_then(|j| j.comment.as_deref())
    }
}

impl Drop for JpegMosaicBackend {
    fn drop(&mut self) {
        self.sweep_should_terminate.store(true, Ordering::SeqCst);
        if let Some(handle) = self.sweep_handle.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
    }
}

/// Background worker body: walk every registered file in order, every
/// index slot in ascending order, densifying the restart-marker index.
/// Checks the termination flag between files and between slots so it
/// returns promptly at the next safe point (spec §4.3 "Background sweep").
///
/// Takes and releases `region_read_mutex` once per index slot, the same
/// mutex the foreground `read_tile` path holds across its decode — this
/// matches `restart_marker_thread_func`'s per-iteration `g_mutex_lock`/
/// `g_mutex_unlock` in the original C source and keeps the sweep from
/// racing foreground reads on shared file state (spec §5).
fn sweep_restart_markers(
    jpegs: Vec<Arc<OneJpeg>>,
    terminate: Arc<AtomicBool>,
    region_read_mutex: Arc<Mutex<()>>,
) {
    for jpeg in &jpegs {
        for target in 1..jpeg.num_segments() {
            if terminate.load(Ordering::SeqCst) {
                return;
            }

            let guard = region_read_mutex.lock().unwrap_or_else(|e| e.into_inner());
            let result = jpeg.compute_mcu_start(target);
            drop(guard);

            if result.is_err() {
                // Missing restart marker mid-sweep is end-of-scan for this
                // file, not fatal (spec §5 propagation policy).
                break;
            }
        }
    }
}
