//! Aggregation of the reduction grids into scalar totals.

use crate::constants::{DATA_SIZE, GRID_BYTES, MAX_EXACT_COUNT};
use crate::grid::ReductionGrids;
use crate::ratio::OverdrawRatio;

/// Totals for one frame: pixels covered at least once and fragments shaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReductionResult {
    pub covered_count: u64,
    pub fragment_count: u64,
}

impl ReductionResult {
    /// Sum two grids into 64-bit totals.
    pub fn from_grids(cover: &[u32], fragments: &[u32]) -> Self {
        debug_assert_eq!(cover.len(), DATA_SIZE);
        debug_assert_eq!(fragments.len(), DATA_SIZE);

        Self {
            covered_count: cover.iter().map(|&c| c as u64).sum(),
            fragment_count: fragments.iter().map(|&f| f as u64).sum(),
        }
    }

    /// Sum grids read back from a staging buffer.
    ///
    /// `bytes` holds the coverage grid immediately followed by the fragment
    /// grid, both as little-endian `u32`.
    pub fn from_staging_bytes(bytes: &[u8]) -> Self {
        let split = GRID_BYTES as usize;
        debug_assert!(bytes.len() >= 2 * split);

        let sum = |grid: &[u8]| -> u64 {
            grid.chunks_exact(4)
                .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]) as u64)
                .sum()
        };

        Self {
            covered_count: sum(&bytes[..split]),
            fragment_count: sum(&bytes[split..2 * split]),
        }
    }

    /// A pixel cannot be covered without being shaded at least once.
    pub fn is_consistent(&self) -> bool {
        self.fragment_count >= self.covered_count
    }

    pub fn ratio(&self) -> OverdrawRatio {
        OverdrawRatio::from_counts(self.fragment_count, self.covered_count)
    }

    /// True when the mean layer count reaches [`MAX_EXACT_COUNT`], so at
    /// least one pixel's counter has stopped counting exactly and
    /// `fragment_count` is a lower bound.
    pub fn exceeds_exact_counts(&self) -> bool {
        self.covered_count > 0
            && self.fragment_count >= self.covered_count * MAX_EXACT_COUNT as u64
    }
}

/// Most recent result by frame, tolerant of readbacks completing out of order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatestResult {
    latest: Option<(u64, ReductionResult)>,
}

impl LatestResult {
    /// Record `result` for `frame_index`. Returns `false` and keeps the
    /// current value when a frame at or after `frame_index` is already held.
    pub fn offer(&mut self, frame_index: u64, result: ReductionResult) -> bool {
        if let Some((held, _)) = self.latest {
            if held >= frame_index {
                return false;
            }
        }
        self.latest = Some((frame_index, result));
        true
    }

    pub fn frame_index(&self) -> Option<u64> {
        self.latest.map(|(frame_index, _)| frame_index)
    }

    pub fn result(&self) -> Option<ReductionResult> {
        self.latest.map(|(_, result)| result)
    }
}

impl From<&ReductionGrids> for ReductionResult {
    fn from(grids: &ReductionGrids) -> Self {
        Self::from_grids(&grids.cover, &grids.fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileGrid;

    fn staging_bytes(cover: &[u32], fragments: &[u32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 * GRID_BYTES as usize);
        bytes.extend_from_slice(bytemuck::cast_slice(cover));
        bytes.extend_from_slice(bytemuck::cast_slice(fragments));
        bytes
    }

    #[test]
    fn test_empty_frame_is_all_zero() {
        let grids = ReductionGrids::zeroed();
        let result = ReductionResult::from(&grids);

        assert_eq!(result.covered_count, 0);
        assert_eq!(result.fragment_count, 0);
        assert_eq!(result.ratio().value(), 1.0);
    }

    #[test]
    fn test_sums_do_not_overflow_u32() {
        let cover = vec![u32::MAX; DATA_SIZE];
        let fragments = vec![u32::MAX; DATA_SIZE];
        let result = ReductionResult::from_grids(&cover, &fragments);

        assert_eq!(result.covered_count, u32::MAX as u64 * DATA_SIZE as u64);
    }

    #[test]
    fn test_staging_bytes_match_grids() {
        let mut cover = vec![0u32; DATA_SIZE];
        let mut fragments = vec![0u32; DATA_SIZE];
        cover[0] = 10;
        cover[DATA_SIZE - 1] = 5;
        fragments[0] = 30;
        fragments[DATA_SIZE - 1] = 5;

        let bytes = staging_bytes(&cover, &fragments);
        let result = ReductionResult::from_staging_bytes(&bytes);

        assert_eq!(result, ReductionResult::from_grids(&cover, &fragments));
        assert_eq!(result.covered_count, 15);
        assert_eq!(result.fragment_count, 35);
    }

    #[test]
    fn test_stacked_layers_scale_fragments() {
        let grid = TileGrid::new(100, 70);
        for layers in 1..=4u32 {
            let counts = vec![layers; 100 * 70];
            let result = ReductionResult::from(&grid.fold(&counts));

            assert_eq!(result.covered_count, 7000);
            assert_eq!(result.fragment_count, 7000 * layers as u64);
            assert_eq!(result.ratio().value(), layers as f32);
            assert!(result.is_consistent());
        }
    }

    #[test]
    fn test_half_screen_single_layer() {
        let grid = TileGrid::new(128, 96);
        let counts: Vec<u32> = (0..96)
            .flat_map(|_| (0..128).map(|x| if x < 64 { 1 } else { 0 }))
            .collect();
        let result = ReductionResult::from(&grid.fold(&counts));

        assert_eq!(result.covered_count, 128 * 96 / 2);
        assert_eq!(result.fragment_count, result.covered_count);
        assert_eq!(result.ratio().value(), 1.0);
    }

    #[test]
    fn test_inconsistent_result_detected() {
        let result = ReductionResult {
            covered_count: 4,
            fragment_count: 3,
        };
        assert!(!result.is_consistent());
        // Clamp still keeps the ratio at the floor.
        assert_eq!(result.ratio().value(), 1.0);
    }

    #[test]
    fn test_exact_count_limit() {
        let below = ReductionResult {
            covered_count: 10,
            fragment_count: 10 * (MAX_EXACT_COUNT as u64 - 1),
        };
        let at = ReductionResult {
            covered_count: 10,
            fragment_count: 10 * MAX_EXACT_COUNT as u64,
        };

        assert!(!below.exceeds_exact_counts());
        assert!(at.exceeds_exact_counts());
        assert!(!ReductionResult::default().exceeds_exact_counts());
    }

    #[test]
    fn test_older_frame_does_not_replace_newer() {
        let newer = ReductionResult {
            covered_count: 7000,
            fragment_count: 7000,
        };
        let older = ReductionResult {
            covered_count: 7000,
            fragment_count: 21000,
        };

        let mut latest = LatestResult::default();
        assert_eq!(latest.result(), None);

        // Frame 5 maps before frame 4 finishes.
        assert!(latest.offer(5, newer));
        assert!(!latest.offer(4, older));
        assert!(!latest.offer(5, older));

        assert_eq!(latest.frame_index(), Some(5));
        assert_eq!(latest.result(), Some(newer));

        assert!(latest.offer(6, older));
        assert_eq!(latest.result(), Some(older));
    }
}
