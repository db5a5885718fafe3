//! JPEG mosaic level assembly: group registered JPEG fragments by z-layer
//! and expand each layer into four `scale_denom` pyramid levels.
//!
//! Direct port of `create_width_to_layer_map` / `generate_layers_into_map`
//! in `openslide-ops-jpeg.c`, per spec §4.4.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::grid::Grid;
use crate::jpeg::restart_index::OneJpeg;

/// The four downsamples a JPEG mosaic layer's restart-marker structure
/// supports natively via the decoder's `scale_denom` knob.
const SCALE_DENOMS: [u8; 4] = [1, 2, 4, 8];

/// One registered JPEG fragment: a source file plus its position in the
/// `(z, x, y)` mosaic grid.
pub struct JpegFragment {
    pub jpeg: Arc<OneJpeg>,
    pub z: i64,
    pub x: i64,
    pub y: i64,
}

/// Whether `(z, x, y)` is the zxy-successor of `(pz, px, py)`, per spec
/// §4.4. Callers must present fragments in this order; violating it is a
/// programmer error in the caller (enforced by `assert!`, not a `Result`).
fn is_zxy_successor(pz: i64, px: i64, py: i64, z: i64, x: i64, y: i64) -> bool {
    if z == pz + 1 {
        return x == 0 && y == 0;
    }
    if z != pz {
        return false;
    }
    if y == py + 1 {
        return x == 0;
    }
    if y != py {
        return false;
    }
    x == px + 1
}

/// One pyramid level backed by a grid of JPEG files, all sharing a single
/// `scale_denom`.
pub struct JpegMosaicLevel {
    /// Row-major `jpegs_across * jpegs_down` source files, shared across
    /// this layer's four `scale_denom` siblings.
    pub layer_jpegs: Arc<Vec<Arc<OneJpeg>>>,
    pub jpegs_across: u32,
    pub jpegs_down: u32,
    /// Uniform `(x=0, y=0)` JPEG's full-resolution pixel size; used to
    /// locate the source file for any pixel coordinate.
    pub image00_w: u32,
    pub image00_h: u32,
    pub scale_denom: u8,
    /// Composite pixel extent at this `scale_denom`.
    pub pixel_w: u32,
    pub pixel_h: u32,
    /// `layer0_pixel_w / pixel_w`, for projecting back to level-0 coordinates.
    pub no_scale_denom_downsample: f64,
}

impl JpegMosaicLevel {
    /// `Grid` descriptor for this level; tile size shrinks with `scale_denom`.
    pub fn grid(&self) -> Grid {
        let tw = self.layer_jpegs[0].tile_width / self.scale_denom as u32;
        let th = self.layer_jpegs[0].tile_height / self.scale_denom as u32;
        Grid::new(self.pixel_w, self.pixel_h, tw, th)
    }

    /// Locate the source JPEG and within-file pixel offset for
    /// level-own-coordinate `(src_x, src_y)`, per spec §4.4 "Per-tile read
    /// path".
    pub fn locate(&self, src_x: u32, src_y: u32) -> (Arc<OneJpeg>, u32, u32) {
        let full_x = src_x * self.scale_denom as u32;
        let full_y = src_y * self.scale_denom as u32;

        let file_x = full_x / self.image00_w;
        let file_y = full_y / self.image00_h;

        let within_x = full_x - file_x * self.image00_w;
        let within_y = full_y - file_y * self.image00_h;

        let file_index = (file_y * self.jpegs_across + file_x) as usize;
        assert!(
            file_index < self.layer_jpegs.len(),
            "pixel coordinate resolves outside the registered mosaic"
        );

        (self.layer_jpegs[file_index].clone(), within_x, within_y)
    }
}

struct LayerAccumulator {
    jpegs: Vec<Arc<OneJpeg>>,
    jpegs_across: i64,
    jpegs_down: i64,
    pixel_w: u32,
    pixel_h: u32,
    image00_w: u32,
    image00_h: u32,
}

/// Group a zxy-ordered fragment stream into per-z layer accumulators, then
/// expand each into four `scale_denom` levels keyed by pixel width.
///
/// Returns levels sorted by descending pixel width, matching the slide's
/// level-0-first ordering convention.
pub fn assemble_levels(fragments: Vec<JpegFragment>) -> Vec<Arc<JpegMosaicLevel>> {
    let mut by_width: BTreeMap<u32, Arc<JpegMosaicLevel>> = BTreeMap::new();

    let mut prev: Option<(i64, i64, i64)> = None;
    let mut current = LayerAccumulator {
        jpegs: Vec::new(),
        jpegs_across: -1,
        jpegs_down: -1,
        pixel_w: 0,
        pixel_h: 0,
        image00_w: 0,
        image00_h: 0,
    };
    let mut layer0_w: u32 = 0;
    let mut any_layer = false;

    let flush = |acc: &mut LayerAccumulator,
                 by_width: &mut BTreeMap<u32, Arc<JpegMosaicLevel>>,
                 layer0_w: u32| {
        if acc.jpegs.is_empty() {
            return;
        }
        let layer_jpegs = Arc::new(std::mem::take(&mut acc.jpegs));
        let jpegs_across = acc.jpegs_across as u32;
        let jpegs_down = acc.jpegs_down as u32;

        for &scale_denom in &SCALE_DENOMS {
            let pixel_w = acc.pixel_w / scale_denom as u32;
            let pixel_h = acc.pixel_h / scale_denom as u32;
            let level = Arc::new(JpegMosaicLevel {
                layer_jpegs: layer_jpegs.clone(),
                jpegs_across,
                jpegs_down,
                image00_w: acc.image00_w,
                image00_h: acc.image00_h,
                scale_denom,
                pixel_w,
                pixel_h,
                no_scale_denom_downsample: layer0_w as f64 / pixel_w as f64,
            });
            by_width.insert(pixel_w, level);
        }

        acc.jpegs_across = -1;
        acc.jpegs_down = -1;
        acc.pixel_w = 0;
        acc.pixel_h = 0;
        acc.image00_w = 0;
        acc.image00_h = 0;
    };

    for frag in fragments {
        if let Some((pz, px, py)) = prev {
            assert!(
                is_zxy_successor(pz, px, py, frag.z, frag.x, frag.y),
                "JPEG fragments must be registered in zxy-successor order: \
                 ({pz},{px},{py}) -> ({},{},{}) is not a valid successor",
                frag.z,
                frag.x,
                frag.y
            );
        }

        if Some(frag.z) != prev.map(|(pz, _, _)| pz) {
            // starting a new z-layer: flush the previous one
            flush(&mut current, &mut by_width, layer0_w);
        }

        if frag.y == 0 {
            current.pixel_w += frag.jpeg.width;
        }
        if frag.x == 0 {
            current.pixel_h += frag.jpeg.height;
        }
        if frag.x == 0 && frag.y == 0 {
            current.image00_w = frag.jpeg.width;
            current.image00_h = frag.jpeg.height;
        }
        current.jpegs_across = current.jpegs_across.max(frag.x + 1);
        current.jpegs_down = current.jpegs_down.max(frag.y + 1);
        current.jpegs.push(frag.jpeg);

        if frag.z == 0 && !any_layer {
            // layer0_w finalized once we know the full z=0 row-0 width;
            // recomputed below after the z=0 layer flushes.
        }
        any_layer = true;
        prev = Some((frag.z, frag.x, frag.y));

        if frag.z == 0 {
            layer0_w = current.pixel_w;
        }
    }
    flush(&mut current, &mut by_width, layer0_w);

    assert!(any_layer, "no JPEG fragments were registered");

    by_width.into_values().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    fn make_jpeg(width: u32, height: u32, tile: u32) -> Arc<OneJpeg> {
        // Build a minimal header identical in shape to restart_index's
        // test fixture, parameterized on size, with restart_interval
        // chosen so tile_width == tile_height == `tile`.
        let mut buf = vec![0xFFu8, crate::jpeg::markers::SOI];
        buf.extend_from_slice(&[0xFF, crate::jpeg::markers::SOF0]);
        buf.extend_from_slice(&[0x00, 11]);
        buf.push(8);
        buf.extend_from_slice(&(height as u16).to_be_bytes());
        buf.extend_from_slice(&(width as u16).to_be_bytes());
        buf.push(1);
        buf.extend_from_slice(&[1, 0x11, 0]);

        let mcus_across = width / 8;
        let mcus_down = height / 8;
        let tiles_across = width / tile;
        let restart_interval = mcus_across / tiles_across;

        buf.extend_from_slice(&[0xFF, crate::jpeg::markers::DRI]);
        buf.extend_from_slice(&[0x00, 0x04]);
        buf.extend_from_slice(&(restart_interval as u16).to_be_bytes());

        buf.extend_from_slice(&[0xFF, crate::jpeg::markers::SOS]);
        buf.extend_from_slice(&[0x00, 0x08]);
        buf.push(1);
        buf.extend_from_slice(&[1, 0x00]);
        buf.extend_from_slice(&[0, 63, 0]);

        let num_segments = (mcus_across * mcus_down) / restart_interval;
        for seg in 0..num_segments {
            buf.push(0xAB);
            if seg + 1 < num_segments {
                buf.push(0xFF);
                buf.push(crate::jpeg::markers::RST_MIN + (seg % 8) as u8);
            }
        }
        buf.push(0xFF);
        buf.push(crate::jpeg::markers::EOI);

        Arc::new(OneJpeg::open("t.jpg", Box::new(MemoryReader::new(buf)), None).unwrap())
    }

    #[test]
    fn single_z_group_yields_four_scale_levels() {
        // 2x2 grid of 1024x1024 jpegs with 64px tiles, per spec §8 S4.
        let f00 = make_jpeg(1024, 1024, 64);
        let f10 = make_jpeg(1024, 1024, 64);
        let f01 = make_jpeg(1024, 1024, 64);
        let f11 = make_jpeg(1024, 1024, 64);

        let fragments = vec![
            JpegFragment {
                jpeg: f00,
                z: 0,
                x: 0,
                y: 0,
            },
            JpegFragment {
                jpeg: f10,
                z: 0,
                x: 1,
                y: 0,
            },
            JpegFragment {
                jpeg: f01,
                z: 0,
                x: 0,
                y: 1,
            },
            JpegFragment {
                jpeg: f11,
                z: 0,
                x: 1,
                y: 1,
            },
        ];

        let levels = assemble_levels(fragments);
        assert_eq!(levels.len(), 4);

        let widths: Vec<u32> = levels.iter().map(|l| l.pixel_w).collect();
        assert_eq!(widths, vec![2048, 1024, 512, 256]);

        assert_eq!(levels[0].jpegs_across, 2);
        assert_eq!(levels[0].jpegs_down, 2);
        assert_eq!(levels[0].no_scale_denom_downsample, 1.0);
        assert_eq!(levels[3].no_scale_denom_downsample, 8.0);
    }

    #[test]
    fn locate_maps_pixel_to_source_file() {
        let f00 = make_jpeg(1024, 1024, 64);
        let f10 = make_jpeg(1024, 1024, 64);

        let fragments = vec![
            JpegFragment {
                jpeg: f00,
                z: 0,
                x: 0,
                y: 0,
            },
            JpegFragment {
                jpeg: f10,
                z: 0,
                x: 1,
                y: 0,
            },
        ];
        let levels = assemble_levels(fragments);
        let level0 = levels.iter().find(|l| l.scale_denom == 1).unwrap();

        let (jpeg, within_x, within_y) = level0.locate(1100, 10);
        assert_eq!(within_x, 1100 - 1024);
        assert_eq!(within_y, 10);
        assert_eq!(jpeg.width, 1024);
    }

    #[test]
    #[should_panic(expected = "zxy-successor")]
    fn out_of_order_fragments_panic() {
        let f00 = make_jpeg(1024, 1024, 64);
        let f01 = make_jpeg(1024, 1024, 64);

        let fragments = vec![
            JpegFragment {
                jpeg: f00,
                z: 0,
                x: 0,
                y: 0,
            },
            JpegFragment {
                jpeg: f01,
                z: 0,
                x: 0,
                y: 5, // not the successor of (0,0,0)
            },
        ];
        assemble_levels(fragments);
    }
}
