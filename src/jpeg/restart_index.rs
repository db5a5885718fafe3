//! Per-file restart-marker index and synthesized single-tile streams.
//!
//! [`OneJpeg`] is the direct analogue of `struct one_jpeg` in
//! `openslide-ops-jpeg.c`: one source JPEG file, its "tile" dimensions
//! (derived from the restart interval, not a declared tile size), and the
//! lazily-filled `starts[]` index of restart-marker byte offsets.
//!
//! The index itself (`starts: Mutex<Vec<i64>>`) carries its own lock so
//! `compute_mcu_start` can take `&self`; callers composing several
//! `OneJpeg`s into a mosaic layer additionally hold a coarser, slide-wide
//! mutex around the whole region-read path (spec §5) since JPEG file
//! handles are shared across a slide's four `scale_denom` levels.

use std::sync::Mutex;

use crate::error::{JpegError, JpegResult};
use crate::io::PositionalReader;
use crate::jpeg::markers;

/// `-1` sentinel for an unknown restart-marker offset, matching the
/// source library's `int64_t` index.
const UNKNOWN: i64 = -1;

/// Parsed structural facts about a JPEG file, extracted by scanning its
/// marker segments through `SOS`.
#[derive(Debug, Clone)]
struct JpegHeader {
    width: u32,
    height: u32,
    restart_interval: u32,
    mcus_per_row: u32,
    mcu_rows_in_scan: u32,
    /// Byte offset of the first entropy-coded byte (and the end of the
    /// header region reused verbatim when synthesizing a tile stream).
    header_stop: u64,
    comment: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Component {
    h_samp: u8,
    v_samp: u8,
}

/// Parse a baseline JPEG's markers up through `SOS`, returning the facts
/// needed to derive per-tile dimensions and the restart-marker index size.
fn parse_header(reader: &dyn PositionalReader, path: &str) -> JpegResult<JpegHeader> {
    let bad = |reason: &str| JpegError::BadFile {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let soi = reader.read_exact_at(0, 2).map_err(|e| io_err(path, e))?;
    if soi != [0xFF, markers::SOI] {
        return Err(bad("missing SOI marker"));
    }

    let mut pos: u64 = 2;
    let mut width = 0u32;
    let mut height = 0u32;
    let mut restart_interval = 0u32;
    let mut components: Vec<Component> = Vec::new();
    let mut comment: Option<String> = None;

    loop {
        let marker_bytes = reader.read_exact_at(pos, 2).map_err(|e| io_err(path, e))?;
        if marker_bytes[0] != 0xFF {
            return Err(bad("expected marker while scanning header"));
        }
        let marker = marker_bytes[1];
        pos += 2;

        if marker == markers::SOS {
            let len_bytes = reader.read_exact_at(pos, 2).map_err(|e| io_err(path, e))?;
            let seg_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as u64;
            pos += seg_len;
            break;
        }

        // standalone markers with no length/payload
        if marker == 0x01 || (0xD0..=0xD9).contains(&marker) {
            continue;
        }

        let len_bytes = reader.read_exact_at(pos, 2).map_err(|e| io_err(path, e))?;
        let seg_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as u64;
        if seg_len < 2 {
            return Err(bad("malformed marker segment length"));
        }
        let payload_len = (seg_len - 2) as usize;
        let payload = reader
            .read_exact_at(pos + 2, payload_len)
            .map_err(|e| io_err(path, e))?;

        match marker {
            markers::SOF0 => {
                if payload.len() < 6 {
                    return Err(bad("truncated SOF0 segment"));
                }
                height = u16::from_be_bytes([payload[1], payload[2]]) as u32;
                width = u16::from_be_bytes([payload[3], payload[4]]) as u32;
                let num_components = payload[5] as usize;
                components.clear();
                for c in 0..num_components {
                    let base = 6 + c * 3;
                    if base + 2 >= payload.len() {
                        return Err(bad("truncated SOF0 component table"));
                    }
                    let samp = payload[base + 1];
                    components.push(Component {
                        h_samp: samp >> 4,
                        v_samp: samp & 0x0F,
                    });
                }
            }
            markers::DRI => {
                if payload.len() < 2 {
                    return Err(bad("truncated DRI segment"));
                }
                restart_interval = u16::from_be_bytes([payload[0], payload[1]]) as u32;
            }
            markers::COM => {
                if comment.is_none() {
                    let text = String::from_utf8_lossy(&payload);
                    let trimmed = text.split('\0').next().unwrap_or("").to_string();
                    comment = Some(trimmed);
                }
            }
            _ => {}
        }

        pos += seg_len;
    }

    if width == 0 || height == 0 {
        return Err(bad("no SOF0 marker found"));
    }
    if restart_interval == 0 {
        return Err(bad("restart interval is zero (not a JPEG mosaic tile source)"));
    }
    if components.is_empty() {
        return Err(bad("no components found in SOF0"));
    }

    let max_h = components.iter().map(|c| c.h_samp).max().unwrap_or(1).max(1) as u32;
    let max_v = components.iter().map(|c| c.v_samp).max().unwrap_or(1).max(1) as u32;

    let mcus_per_row = (width + 8 * max_h - 1) / (8 * max_h);
    let mcu_rows_in_scan = (height + 8 * max_v - 1) / (8 * max_v);

    Ok(JpegHeader {
        width,
        height,
        restart_interval,
        mcus_per_row,
        mcu_rows_in_scan,
        header_stop: pos,
        comment,
    })
}

fn io_err(path: &str, source: std::io::Error) -> JpegError {
    JpegError::Io {
        path: path.to_string(),
        source,
    }
}

/// One source JPEG file, addressable by restart-marker segment.
pub struct OneJpeg {
    pub path: String,
    reader: Box<dyn PositionalReader>,
    file_size: u64,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub comment: Option<String>,
    header_stop: u64,
    starts: Mutex<Vec<i64>>,
    hints: Option<Vec<i64>>,
}

impl OneJpeg {
    /// Parse `reader`'s headers and build an empty (mostly `-1`) restart
    /// index, per spec §4.3 "Initial population".
    pub fn open(
        path: impl Into<String>,
        reader: Box<dyn PositionalReader>,
        hints: Option<Vec<i64>>,
    ) -> JpegResult<Self> {
        let path = path.into();
        let file_size = reader.size();
        let header = parse_header(reader.as_ref(), &path)?;

        let tiles_across = header.mcus_per_row / header.restart_interval;
        if tiles_across == 0 {
            return Err(JpegError::BadFile {
                path,
                reason: "restart interval exceeds MCUs per row".to_string(),
            });
        }
        let tile_width = header.width / tiles_across;
        let tile_height = header.height / header.mcu_rows_in_scan;

        let num_segments =
            (header.mcus_per_row * header.mcu_rows_in_scan) / header.restart_interval;
        let mut starts = vec![UNKNOWN; num_segments.max(1) as usize];
        starts[0] = header.header_stop as i64;

        if let Some(h) = &hints {
            if h.len() != starts.len() {
                return Err(JpegError::BadFile {
                    path,
                    reason: format!(
                        "hint table has {} entries, expected {}",
                        h.len(),
                        starts.len()
                    ),
                });
            }
        }

        Ok(Self {
            path,
            reader,
            file_size,
            width: header.width,
            height: header.height,
            tile_width,
            tile_height,
            comment: header.comment,
            header_stop: header.header_stop,
            starts: Mutex::new(starts),
            hints,
        })
    }

    pub fn num_segments(&self) -> usize {
        self.starts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// The byte offset of segment 0 — also the end of the reusable header
    /// region for synthesized streams.
    pub fn header_stop(&self) -> u64 {
        self.header_stop
    }

    /// Fill `starts[target]`, per spec §4.3 "On-demand fill".
    pub fn compute_mcu_start(&self, target: usize) -> JpegResult<()> {
        {
            let starts = self.starts.lock().unwrap_or_else(|e| e.into_inner());
            if starts[target] != UNKNOWN {
                return Ok(());
            }
        }
        assert_ne!(target, 0, "segment 0 is always populated at open time");

        if let Some(hints) = &self.hints {
            let candidate = hints[target];
            if candidate >= 0 && self.accept_hint(candidate as u64)? {
                let mut starts = self.starts.lock().unwrap_or_else(|e| e.into_inner());
                starts[target] = candidate;
                return Ok(());
            }
            tracing::warn!(
                path = %self.path,
                target,
                "restart marker hint rejected, falling back to forward scan"
            );
        }

        let first_good = {
            let starts = self.starts.lock().unwrap_or_else(|e| e.into_inner());
            let mut k = target - 1;
            while starts[k] == UNKNOWN {
                k -= 1;
            }
            k
        };

        let mut cursor = {
            let starts = self.starts.lock().unwrap_or_else(|e| e.into_inner());
            starts[first_good] as u64
        };
        let mut k = first_good;

        while k < target {
            match markers::find_next_ff_marker(self.reader.as_ref(), cursor)
                .map_err(|e| io_err(&self.path, e))?
            {
                markers::NextMarker::Eof => break,
                markers::NextMarker::Found {
                    marker,
                    after_marker_pos,
                } => {
                    cursor = after_marker_pos;
                    if marker == markers::EOI {
                        break;
                    }
                    if markers::is_restart_marker(marker) {
                        let mut starts = self.starts.lock().unwrap_or_else(|e| e.into_inner());
                        k += 1;
                        starts[k] = after_marker_pos as i64;
                    }
                }
            }
        }

        Ok(())
    }

    /// Validate an externally-supplied hint offset by checking the two
    /// bytes immediately preceding it are a restart marker.
    fn accept_hint(&self, offset: u64) -> JpegResult<bool> {
        if offset < 2 {
            return Ok(false);
        }
        let bytes = self
            .reader
            .read_exact_at(offset - 2, 2)
            .map_err(|e| io_err(&self.path, e))?;
        Ok(bytes[0] == 0xFF && markers::is_restart_marker(bytes[1]))
    }

    /// Build the minimal self-contained JPEG stream for restart segment
    /// `mcu_start`: the original header bytes, followed by the segment's
    /// entropy-coded bytes, with the final byte rewritten to form a valid
    /// `FF D9` EOI (spec §4.3 "Synthesized tile stream").
    pub fn synthesize_tile_stream(&self, mcu_start: usize) -> JpegResult<Vec<u8>> {
        self.compute_mcu_start(mcu_start)?;

        let num_segments = self.num_segments();
        let stop_position = if mcu_start + 1 == num_segments {
            self.file_size
        } else {
            self.compute_mcu_start(mcu_start + 1)?;
            let starts = self.starts.lock().unwrap_or_else(|e| e.into_inner());
            starts[mcu_start + 1] as u64
        };

        let start_position = {
            let starts = self.starts.lock().unwrap_or_else(|e| e.into_inner());
            starts[mcu_start] as u64
        };

        let header = self
            .reader
            .read_exact_at(0, self.header_stop as usize)
            .map_err(|e| io_err(&self.path, e))?;
        let scan = self
            .reader
            .read_exact_at(start_position, (stop_position - start_position) as usize)
            .map_err(|e| io_err(&self.path, e))?;

        let mut buf = Vec::with_capacity(header.len() + scan.len());
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&scan);

        assert_ne!(
            buf[self.header_stop as usize], 0xFF,
            "header/scan split lands mid-marker"
        );
        assert_eq!(
            buf[buf.len() - 2],
            0xFF,
            "penultimate byte must be 0xFF to synthesize a valid EOI"
        );
        let last = buf.len() - 1;
        buf[last] = markers::EOI;

        Ok(buf)
    }

    /// Debug/test harness from spec §8 invariant 1: for every populated
    /// index entry, confirm the two bytes preceding it form a restart
    /// marker.
    pub fn verify_mcu_starts(&self) -> JpegResult<()> {
        let starts = self.starts.lock().unwrap_or_else(|e| e.into_inner());
        for (i, &offset) in starts.iter().enumerate().skip(1) {
            if offset == UNKNOWN {
                continue;
            }
            let bytes = self
                .reader
                .read_exact_at(offset as u64 - 2, 2)
                .map_err(|e| io_err(&self.path, e))?;
            assert_eq!(bytes[0], 0xFF, "segment {i} start not preceded by 0xFF");
            assert!(
                markers::is_restart_marker(bytes[1]),
                "segment {i} start not preceded by a restart marker"
            );
        }
        Ok(())
    }
}
