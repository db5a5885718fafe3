//! Decoding a synthesized single-tile JPEG stream into ARGB32 pixels.
//!
//! The original library tricks libjpeg into emitting exactly one tile by
//! overriding `cinfo.image_width`/`image_height` after `jpeg_read_header`
//! (spec §4.3 "Decoder cunning"). The `image` crate has no equivalent knob,
//! so [`ImageCrateDecoder`] gets the same effect by patching the SOF0
//! marker's width/height fields directly in the synthesized buffer before
//! handing it to the decoder — the decoder then believes the image really
//! is `tile_width x tile_height`, and the extra entropy-coded data past
//! that point is simply never read because a restart marker (or our
//! synthetic EOI) ends the scan there.
//!
//! `scale_denom` is requested by the source library as the JPEG decoder's
//! own DCT-domain downsampling. The `image` crate's JPEG decoder has no
//! such control, so this is approximated with a post-decode
//! `image::imageops::resize` pass — a documented fidelity gap (see
//! `DESIGN.md`), not a silent difference: box-filtered resize of the
//! full-resolution decode is close to but not bit-identical to true DCT
//! scaling.

use std::io::Cursor;

use image::{imageops::FilterType, GenericImageView};

use crate::error::JpegError;

/// Decodes a synthesized JPEG tile stream into ARGB32 pixels, honoring
/// `scale_denom` downsampling.
///
/// A trait seam so the mosaic read path can be tested without linking a
/// real JPEG decoder.
pub trait JpegDecoder: Send + Sync {
    /// Decode `stream` (as produced by
    /// [`crate::jpeg::restart_index::OneJpeg::synthesize_tile_stream`]),
    /// expecting `tile_w x tile_h` pixels at `scale_denom == 1`, and return
    /// `(tile_w / scale_denom) * (tile_h / scale_denom)` ARGB32 pixels,
    /// row-major.
    fn decode_tile(
        &self,
        stream: &[u8],
        tile_w: u32,
        tile_h: u32,
        scale_denom: u8,
    ) -> Result<Vec<u32>, JpegError>;
}

/// Production [`JpegDecoder`] backed by the `image` crate's baseline JPEG
/// support.
pub struct ImageCrateDecoder;

impl JpegDecoder for ImageCrateDecoder {
    fn decode_tile(
        &self,
        stream: &[u8],
        tile_w: u32,
        tile_h: u32,
        scale_denom: u8,
    ) -> Result<Vec<u32>, JpegError> {
        let patched = patch_sof0_dimensions(stream, tile_w, tile_h)?;

        let img = image::load(Cursor::new(&patched), image::ImageFormat::Jpeg).map_err(|e| {
            JpegError::DecodeFailure {
                col: 0,
                row: 0,
                scale_denom,
                reason: e.to_string(),
            }
        })?;

        let (out_w, out_h) = (
            (tile_w / scale_denom as u32).max(1),
            (tile_h / scale_denom as u32).max(1),
        );

        let resized = if scale_denom == 1 {
            img
        } else {
            img.resize_exact(out_w, out_h, FilterType::Triangle)
        };

        let rgba = resized.to_rgba8();
        let (w, h) = rgba.dimensions();
        let mut out = Vec::with_capacity((w * h) as usize);
        for px in rgba.pixels() {
            let [r, g, b, _] = px.0;
            out.push(0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32);
        }
        Ok(out)
    }
}

/// Rewrite the width/height fields of a JPEG byte buffer's SOF0 segment in
/// place, returning a patched copy. `tile_w`/`tile_h` must not exceed the
/// real image dimensions declared in the stream.
fn patch_sof0_dimensions(stream: &[u8], tile_w: u32, tile_h: u32) -> Result<Vec<u8>, JpegError> {
    let bad = |reason: &str| JpegError::DecodeFailure {
        col: 0,
        row: 0,
        scale_denom: 1,
        reason: reason.to_string(),
    };

    if stream.len() < 4 || stream[0..2] != [0xFF, crate::jpeg::markers::SOI] {
        return Err(bad("synthesized stream missing SOI"));
    }

    let mut out = stream.to_vec();
    let mut pos = 2usize;

    while pos + 1 < out.len() {
        if out[pos] != 0xFF {
            return Err(bad("expected marker while locating SOF0"));
        }
        let marker = out[pos + 1];
        if marker == crate::jpeg::markers::SOS || marker == crate::jpeg::markers::EOI {
            break;
        }
        pos += 2;
        if marker == 0x01 || (0xD0..=0xD9).contains(&marker) {
            continue;
        }
        if pos + 1 >= out.len() {
            return Err(bad("truncated marker segment"));
        }
        let seg_len = u16::from_be_bytes([out[pos], out[pos + 1]]) as usize;

        if marker == crate::jpeg::markers::SOF0 {
            if pos + 2 + 4 >= out.len() {
                return Err(bad("truncated SOF0 segment"));
            }
            let h_bytes = (tile_h as u16).to_be_bytes();
            let w_bytes = (tile_w as u16).to_be_bytes();
            out[pos + 3] = h_bytes[0];
            out[pos + 4] = h_bytes[1];
            out[pos + 5] = w_bytes[0];
            out[pos + 6] = w_bytes[1];
            return Ok(out);
        }

        pos += seg_len;
    }

    Err(bad("no SOF0 marker found in synthesized stream"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_rewrites_declared_dimensions() {
        let mut buf = vec![0xFFu8, crate::jpeg::markers::SOI];
        buf.extend_from_slice(&[0xFF, crate::jpeg::markers::SOF0]);
        buf.extend_from_slice(&[0x00, 11]);
        buf.push(8);
        buf.extend_from_slice(&1024u16.to_be_bytes());
        buf.extend_from_slice(&1024u16.to_be_bytes());
        buf.push(1);
        buf.extend_from_slice(&[1, 0x11, 0]);
        buf.extend_from_slice(&[0xFF, crate::jpeg::markers::SOS]);

        let patched = patch_sof0_dimensions(&buf, 64, 48).unwrap();
        let height = u16::from_be_bytes([patched[7], patched[8]]);
        let width = u16::from_be_bytes([patched[9], patched[10]]);
        assert_eq!(height, 48);
        assert_eq!(width, 64);
    }

    #[test]
    fn patch_rejects_stream_without_sof0() {
        let buf = vec![0xFF, crate::jpeg::markers::SOI, 0xFF, crate::jpeg::markers::SOS];
        assert!(patch_sof0_dimensions(&buf, 8, 8).is_err());
    }
}
