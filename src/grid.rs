//! Tile grid geometry and region painting.
//!
//! Every pyramid level — whether backed by a JPEG mosaic layer or a DICOM
//! frame sequence — exposes the same rectangular grid abstraction (spec
//! §4.2): a level is `tiles_across * tiles_down` tiles of `tile_w * tile_h`
//! pixels each, with the final column/row clipped to the level's true
//! pixel width/height. [`Grid`] holds that geometry; [`paint_region`] maps
//! an arbitrary pixel rectangle onto the tiles it touches and composites
//! them into a caller-supplied ARGB32 buffer, clipping at both the tile and
//! level edges.
//!
//! This mirrors the read-region code path common to both
//! `openslide-ops-jpeg.c`'s `read_tile` loop and
//! `openslide-vendor-dicom.c`'s `paint_region`, generalized into one
//! backend-agnostic routine driven by a [`TileSource`] callback.

use crate::error::EngineResult;

/// Rectangular tile geometry for one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    /// True pixel width of the level (may not be a multiple of `tile_w`).
    pub level_w: u32,
    /// True pixel height of the level.
    pub level_h: u32,
    pub tile_w: u32,
    pub tile_h: u32,
}

impl Grid {
    pub fn new(level_w: u32, level_h: u32, tile_w: u32, tile_h: u32) -> Self {
        assert!(tile_w > 0 && tile_h > 0, "tile dimensions must be non-zero");
        Self {
            level_w,
            level_h,
            tile_w,
            tile_h,
        }
    }

    /// Number of tile columns, counting a final partial column.
    pub fn tiles_across(&self) -> u32 {
        (self.level_w + self.tile_w - 1) / self.tile_w
    }

    /// Number of tile rows, counting a final partial row.
    pub fn tiles_down(&self) -> u32 {
        (self.level_h + self.tile_h - 1) / self.tile_h
    }

    /// True pixel width of tile column `col` (clipped at the right edge).
    pub fn tile_width_at(&self, col: u32) -> u32 {
        let full_w = self.tile_w;
        let remaining = self.level_w.saturating_sub(col * self.tile_w);
        remaining.min(full_w)
    }

    /// True pixel height of tile row `row` (clipped at the bottom edge).
    pub fn tile_height_at(&self, row: u32) -> u32 {
        let full_h = self.tile_h;
        let remaining = self.level_h.saturating_sub(row * self.tile_h);
        remaining.min(full_h)
    }

    /// Whether `(col, row)` names a tile inside this grid.
    pub fn in_bounds(&self, col: u32, row: u32) -> bool {
        col < self.tiles_across() && row < self.tiles_down()
    }
}

/// A pixel rectangle requested for painting, in level-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Supplies decoded tiles on demand during region painting.
///
/// Implemented by the JPEG and DICOM backends over their respective
/// decode paths. `Ok(None)` means the tile is legitimately absent (out of
/// the level's bounds) and `dst` is left untouched for it; `Err` means the
/// decode itself failed and must abort the paint rather than be treated
/// as a blank tile (spec §7: a decode failure "returns false and
/// populates an error channel", distinct from the zero-fill a missing
/// tile gets).
pub trait TileSource {
    /// Fetch the ARGB32 pixels for tile `(col, row)`, row-major,
    /// `grid.tile_width_at(col) * grid.tile_height_at(row)` entries.
    fn fetch_tile(&self, col: u32, row: u32) -> EngineResult<Option<Vec<u32>>>;
}

/// Paint `region` into `dst` (row-major ARGB32, `region.w * region.h`
/// entries), fetching only the tiles the region actually intersects.
///
/// Pixels of `region` that fall outside the level's true bounds are left
/// untouched in `dst` (typically pre-zeroed by the caller), matching both
/// backends' "read past the edge returns transparent/blank" behavior. A
/// tile whose decode genuinely fails aborts the paint and propagates the
/// error instead of being treated as blank.
pub fn paint_region(
    grid: &Grid,
    source: &dyn TileSource,
    region: Region,
    dst: &mut [u32],
) -> EngineResult<()> {
    assert_eq!(
        dst.len(),
        region.w as usize * region.h as usize,
        "destination buffer must match region dimensions"
    );

    if region.w == 0 || region.h == 0 {
        return Ok(());
    }

    let region_x1 = region.x.saturating_add(region.w);
    let region_y1 = region.y.saturating_add(region.h);

    let clipped_x1 = region_x1.min(grid.level_w);
    let clipped_y1 = region_y1.min(grid.level_h);
    if region.x >= clipped_x1 || region.y >= clipped_y1 {
        return Ok(());
    }

    let col_start = region.x / grid.tile_w;
    let col_end = (clipped_x1 - 1) / grid.tile_w;
    let row_start = region.y / grid.tile_h;
    let row_end = (clipped_y1 - 1) / grid.tile_h;

    for row in row_start..=row_end {
        let tile_h = grid.tile_height_at(row);
        let tile_top = row * grid.tile_h;

        for col in col_start..=col_end {
            let Some(tile) = source.fetch_tile(col, row)? else {
                continue;
            };

            let tile_w = grid.tile_width_at(col);
            let tile_left = col * grid.tile_w;

            debug_assert_eq!(tile.len(), tile_w as usize * tile_h as usize);

            let src_x0 = region.x.saturating_sub(tile_left).min(tile_w);
            let src_x1 = clipped_x1.saturating_sub(tile_left).min(tile_w);
            let src_y0 = region.y.saturating_sub(tile_top).min(tile_h);
            let src_y1 = clipped_y1.saturating_sub(tile_top).min(tile_h);

            if src_x0 >= src_x1 || src_y0 >= src_y1 {
                continue;
            }

            let dst_x0 = (tile_left + src_x0).saturating_sub(region.x);
            let dst_y0 = (tile_top + src_y0).saturating_sub(region.y);

            for sy in src_y0..src_y1 {
                let src_row_start = sy as usize * tile_w as usize + src_x0 as usize;
                let src_row_end = src_row_start + (src_x1 - src_x0) as usize;
                let dst_row = dst_y0 + (sy - src_y0);
                let dst_row_start = dst_row as usize * region.w as usize + dst_x0 as usize;
                let dst_row_end = dst_row_start + (src_x1 - src_x0) as usize;

                dst[dst_row_start..dst_row_end]
                    .copy_from_slice(&tile[src_row_start..src_row_end]);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeTiles {
        tiles: HashMap<(u32, u32), Vec<u32>>,
    }

    impl TileSource for FakeTiles {
        fn fetch_tile(&self, col: u32, row: u32) -> EngineResult<Option<Vec<u32>>> {
            Ok(self.tiles.get(&(col, row)).cloned())
        }
    }

    fn solid_tile(w: u32, h: u32, value: u32) -> Vec<u32> {
        vec![value; (w * h) as usize]
    }

    #[test]
    fn grid_reports_partial_edge_tiles() {
        let grid = Grid::new(100, 50, 64, 64);
        assert_eq!(grid.tiles_across(), 2);
        assert_eq!(grid.tiles_down(), 1);
        assert_eq!(grid.tile_width_at(0), 64);
        assert_eq!(grid.tile_width_at(1), 36);
        assert_eq!(grid.tile_height_at(0), 50);
    }

    #[test]
    fn paint_region_single_tile_fully_inside() {
        let grid = Grid::new(64, 64, 64, 64);
        let mut tiles = HashMap::new();
        tiles.insert((0, 0), solid_tile(64, 64, 0xFF00FF00));
        let source = FakeTiles { tiles };

        let mut dst = vec![0u32; 16 * 16];
        paint_region(
            &grid,
            &source,
            Region {
                x: 10,
                y: 10,
                w: 16,
                h: 16,
            },
            &mut dst,
        ).unwrap();

        assert!(dst.iter().all(|&p| p == 0xFF00FF00));
    }

    #[test]
    fn paint_region_spans_four_tiles() {
        let grid = Grid::new(128, 128, 64, 64);
        let mut tiles = HashMap::new();
        tiles.insert((0, 0), solid_tile(64, 64, 1));
        tiles.insert((1, 0), solid_tile(64, 64, 2));
        tiles.insert((0, 1), solid_tile(64, 64, 3));
        tiles.insert((1, 1), solid_tile(64, 64, 4));
        let source = FakeTiles { tiles };

        let mut dst = vec![0u32; 32 * 32];
        paint_region(
            &grid,
            &source,
            Region {
                x: 48,
                y: 48,
                w: 32,
                h: 32,
            },
            &mut dst,
        ).unwrap();

        // top-left quadrant of dst comes from tile (0,0), bottom-right from (1,1)
        assert_eq!(dst[0], 1);
        assert_eq!(dst[31], 2);
        assert_eq!(dst[31 * 32], 3);
        assert_eq!(dst[31 * 32 + 31], 4);
    }

    #[test]
    fn paint_region_clips_at_level_edge() {
        let grid = Grid::new(100, 100, 64, 64);
        let mut tiles = HashMap::new();
        tiles.insert((1, 1), solid_tile(36, 36, 9));
        let source = FakeTiles { tiles };

        let mut dst = vec![0xAAu32; 40 * 40];
        paint_region(
            &grid,
            &source,
            Region {
                x: 80,
                y: 80,
                w: 40,
                h: 40,
            },
            &mut dst,
        ).unwrap();

        // region requested 40x40 but only 20x20 pixels exist (100-80); the
        // rest of dst is left untouched (still 0xAA)
        assert_eq!(dst[0], 9);
        assert_eq!(dst[39], 0xAA);
    }

    #[test]
    fn paint_region_missing_tile_leaves_dst_untouched() {
        let grid = Grid::new(64, 64, 64, 64);
        let source = FakeTiles {
            tiles: HashMap::new(),
        };

        let mut dst = vec![0x42u32; 8 * 8];
        paint_region(
            &grid,
            &source,
            Region {
                x: 0,
                y: 0,
                w: 8,
                h: 8,
            },
            &mut dst,
        ).unwrap();

        assert!(dst.iter().all(|&p| p == 0x42));
    }

    #[test]
    fn region_entirely_outside_level_is_noop() {
        let grid = Grid::new(64, 64, 64, 64);
        let source = FakeTiles {
            tiles: HashMap::new(),
        };
        let mut dst = vec![0x7u32; 4 * 4];
        paint_region(
            &grid,
            &source,
            Region {
                x: 100,
                y: 100,
                w: 4,
                h: 4,
            },
            &mut dst,
        ).unwrap();
        assert!(dst.iter().all(|&p| p == 0x7));
    }
}
