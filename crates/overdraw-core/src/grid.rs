//! Tile grid mapping between screen pixels, work-groups and reduction cells.
//!
//! The screen is split into `GROUP_DIMENSION`-sized tiles, one per work-group.
//! Each tile folds into a single cell of the fixed `DATA_DIMENSION` square
//! grids. Screens wider than `DATA_DIMENSION * GROUP_DIMENSION` pixels wrap
//! around; cells are accumulated atomically and only the grand totals are read.

use crate::constants::{DATA_DIMENSION, DATA_SIZE, GROUP_DIMENSION};

/// Dispatch geometry for one frame's reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Work-groups to dispatch along x and y.
    ///
    /// Uses ceiling division so the last partial row/column of tiles is still
    /// covered when the size is not a multiple of `GROUP_DIMENSION`.
    pub fn dispatch_size(&self) -> (u32, u32) {
        (
            self.width.div_ceil(GROUP_DIMENSION),
            self.height.div_ceil(GROUP_DIMENSION),
        )
    }

    /// Reduction cell written by the work-group at `(group_x, group_y)`.
    pub fn cell_for_group(group_x: u32, group_y: u32) -> usize {
        ((group_y % DATA_DIMENSION) * DATA_DIMENSION + (group_x % DATA_DIMENSION)) as usize
    }

    /// Reduction cell that accumulates pixel `(x, y)`.
    pub fn cell_for_pixel(x: u32, y: u32) -> usize {
        Self::cell_for_group(x / GROUP_DIMENSION, y / GROUP_DIMENSION)
    }

    /// Number of pixels reachable by the dispatch.
    ///
    /// Always at least `width * height`; the excess is masked off in the
    /// kernel by a bounds check.
    pub fn dispatched_pixels(&self) -> u64 {
        let (x, y) = self.dispatch_size();
        x as u64 * y as u64 * (GROUP_DIMENSION as u64 * GROUP_DIMENSION as u64)
    }

    /// CPU model of the reduction kernel.
    ///
    /// `counts` is a row-major `width * height` image of per-pixel shade
    /// counts. The returned grids hold exactly what the GPU kernel writes for
    /// the same image.
    pub fn fold(&self, counts: &[u32]) -> ReductionGrids {
        debug_assert_eq!(counts.len(), (self.width * self.height) as usize);

        let mut grids = ReductionGrids::zeroed();
        for y in 0..self.height {
            for x in 0..self.width {
                let count = counts[(y * self.width + x) as usize];
                let cell = Self::cell_for_pixel(x, y);
                grids.fragments[cell] += count;
                if count > 0 {
                    grids.cover[cell] += 1;
                }
            }
        }
        grids
    }
}

/// Host copy of the coverage and fragment grids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionGrids {
    pub cover: Vec<u32>,
    pub fragments: Vec<u32>,
}

impl ReductionGrids {
    pub fn zeroed() -> Self {
        Self {
            cover: vec![0; DATA_SIZE],
            fragments: vec![0; DATA_SIZE],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_size_exact_multiple() {
        let grid = TileGrid::new(1280, 640);
        assert_eq!(grid.dispatch_size(), (40, 20));
    }

    #[test]
    fn test_dispatch_size_rounds_up() {
        let grid = TileGrid::new(1921, 1079);
        assert_eq!(grid.dispatch_size(), (61, 34));

        let tiny = TileGrid::new(1, 1);
        assert_eq!(tiny.dispatch_size(), (1, 1));
    }

    #[test]
    fn test_dispatch_covers_every_pixel() {
        for (w, h) in [(100, 70), (33, 31), (32, 32), (1023, 769)] {
            let grid = TileGrid::new(w, h);
            let (gx, gy) = grid.dispatch_size();
            assert!(gx * GROUP_DIMENSION >= w);
            assert!(gy * GROUP_DIMENSION >= h);
            // No wasted full row/column of groups either.
            assert!((gx - 1) * GROUP_DIMENSION < w);
            assert!((gy - 1) * GROUP_DIMENSION < h);
            assert!(grid.dispatched_pixels() >= (w * h) as u64);
        }
    }

    #[test]
    fn test_cell_wraps_past_grid() {
        assert_eq!(TileGrid::cell_for_group(0, 0), 0);
        assert_eq!(TileGrid::cell_for_group(1, 2), 2 * DATA_DIMENSION as usize + 1);
        assert_eq!(TileGrid::cell_for_group(DATA_DIMENSION, 0), 0);
        assert_eq!(TileGrid::cell_for_pixel(31, 31), 0);
        assert_eq!(TileGrid::cell_for_pixel(32, 0), 1);
    }

    #[test]
    fn test_fold_edge_pixels_are_counted() {
        // 100x70 leaves a partial tile column (x 96..100) and row (y 64..70).
        let grid = TileGrid::new(100, 70);
        let mut counts = vec![0u32; 100 * 70];
        for x in 0..100 {
            counts[(69 * 100 + x) as usize] = 2;
        }
        for y in 0..70 {
            counts[(y * 100 + 99) as usize] = 2;
        }

        let grids = grid.fold(&counts);
        let covered: u32 = grids.cover.iter().sum();
        let fragments: u32 = grids.fragments.iter().sum();

        assert_eq!(covered, 100 + 70 - 1);
        assert_eq!(fragments, 2 * (100 + 70 - 1));
        assert_eq!(grids.cover[TileGrid::cell_for_pixel(99, 69)], 4 + 6 - 1);
    }

    #[test]
    fn test_fold_is_deterministic() {
        let grid = TileGrid::new(64, 48);
        let counts: Vec<u32> = (0..64 * 48).map(|i| (i % 5) as u32).collect();
        assert_eq!(grid.fold(&counts), grid.fold(&counts));
    }
}
