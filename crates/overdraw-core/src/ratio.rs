//! The overdraw ratio and the shared cell it is published through.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Fragments shaded per covered pixel, never below 1.0.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct OverdrawRatio(f32);

impl OverdrawRatio {
    /// Ratio of a frame with no overdraw (or nothing drawn at all).
    pub const NONE: Self = Self(1.0);

    pub fn from_counts(fragment_count: u64, covered_count: u64) -> Self {
        if covered_count == 0 {
            return Self::NONE;
        }
        let ratio = (fragment_count as f64 / covered_count as f64) as f32;
        Self(ratio.max(1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for OverdrawRatio {
    fn default() -> Self {
        Self::NONE
    }
}

impl std::fmt::Display for OverdrawRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Latest ratio, written once per frame by the pipeline and readable from
/// anywhere.
///
/// Clones share the same cell. Stores and loads are single atomic word
/// operations so readers never block and never see a torn value; they may see
/// the previous frame's value, which is expected.
#[derive(Debug, Clone)]
pub struct SharedRatio {
    bits: Arc<AtomicU32>,
}

impl SharedRatio {
    pub fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(OverdrawRatio::NONE.value().to_bits())),
        }
    }

    pub fn load(&self) -> OverdrawRatio {
        OverdrawRatio(f32::from_bits(self.bits.load(Ordering::Relaxed)))
    }

    pub fn store(&self, ratio: OverdrawRatio) {
        self.bits.store(ratio.value().to_bits(), Ordering::Relaxed);
    }
}

impl Default for SharedRatio {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_coverage_is_one() {
        assert_eq!(OverdrawRatio::from_counts(0, 0).value(), 1.0);
        // Fragments without coverage cannot happen, but must still clamp.
        assert_eq!(OverdrawRatio::from_counts(12, 0).value(), 1.0);
    }

    #[test]
    fn test_ratio_values() {
        assert_eq!(OverdrawRatio::from_counts(300, 100).value(), 3.0);
        assert_eq!(OverdrawRatio::from_counts(150, 100).value(), 1.5);
        assert_eq!(OverdrawRatio::from_counts(100, 100).value(), 1.0);
    }

    #[test]
    fn test_ratio_floor() {
        assert_eq!(OverdrawRatio::from_counts(50, 100).value(), 1.0);
    }

    #[test]
    fn test_shared_ratio_starts_at_one() {
        let shared = SharedRatio::default();
        assert_eq!(shared.load(), OverdrawRatio::NONE);
    }

    #[test]
    fn test_shared_ratio_clones_observe_writes() {
        let writer = SharedRatio::new();
        let reader = writer.clone();

        writer.store(OverdrawRatio::from_counts(250, 100));
        assert_eq!(reader.load().value(), 2.5);

        let handle = std::thread::spawn(move || reader.load().value());
        assert_eq!(handle.join().unwrap(), 2.5);
    }

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(OverdrawRatio::from_counts(7, 3).to_string(), "2.33");
    }
}
