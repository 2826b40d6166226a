//! Fixed sizes shared by the reduction kernel and the CPU-side aggregation.
//!
//! The WGSL kernel hard-codes the same values; keep them in sync.

/// Side length in pixels of the screen tile reduced by one work-group.
pub const GROUP_DIMENSION: u32 = 32;

/// Threads per work-group axis. Each thread folds a 2x2 pixel block so a
/// 16x16 group still spans a full `GROUP_DIMENSION` tile.
pub const GROUP_THREADS: u32 = 16;

/// Pixels per thread axis.
pub const PIXELS_PER_THREAD: u32 = GROUP_DIMENSION / GROUP_THREADS;

/// Side length of the reduction grids, independent of screen resolution.
pub const DATA_DIMENSION: u32 = 128;

/// Entries in each reduction grid.
pub const DATA_SIZE: usize = (DATA_DIMENSION * DATA_DIMENSION) as usize;

/// Size in bytes of one reduction grid (`u32` per entry).
pub const GRID_BYTES: u64 = (DATA_SIZE * std::mem::size_of::<u32>()) as u64;

/// Largest per-pixel fragment count the `R16Float` counter holds exactly.
/// Above it the half-float spacing exceeds 1.0 and `+1.0` blends round away.
pub const MAX_EXACT_COUNT: u32 = 2048;
