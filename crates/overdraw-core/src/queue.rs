//! Render-queue classification and draw ordering.
//!
//! Drawables carry a numeric queue priority. The geometry pass selects one
//! queue range at a time and orders the survivors with a sorting criteria:
//! opaque geometry front-to-back for early depth rejection, transparent
//! geometry back-to-front for correct blending.

use std::cmp::Ordering;
use std::ops::RangeInclusive;

/// Queue priority of a drawable. Lower values draw first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderQueue(pub u32);

impl RenderQueue {
    pub const BACKGROUND: Self = Self(1000);
    pub const GEOMETRY: Self = Self(2000);
    pub const ALPHA_TEST: Self = Self(2450);
    pub const TRANSPARENT: Self = Self(3000);
    pub const OVERLAY: Self = Self(4000);

    pub fn is_opaque(self) -> bool {
        RenderQueueRange::OPAQUE.contains(self)
    }

    pub fn is_transparent(self) -> bool {
        RenderQueueRange::TRANSPARENT.contains(self)
    }
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::GEOMETRY
    }
}

/// Inclusive range of queue priorities drawn by one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderQueueRange {
    pub lower: u32,
    pub upper: u32,
}

impl RenderQueueRange {
    pub const OPAQUE: Self = Self {
        lower: 0,
        upper: 2500,
    };
    pub const TRANSPARENT: Self = Self {
        lower: 2501,
        upper: 5000,
    };
    pub const ALL: Self = Self {
        lower: 0,
        upper: 5000,
    };

    pub fn contains(&self, queue: RenderQueue) -> bool {
        (self.lower..=self.upper).contains(&queue.0)
    }
}

impl From<RangeInclusive<u32>> for RenderQueueRange {
    fn from(range: RangeInclusive<u32>) -> Self {
        Self {
            lower: *range.start(),
            upper: *range.end(),
        }
    }
}

/// Draw ordering within a queue range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortingCriteria {
    /// Queue ascending, then nearest first.
    CommonOpaque,
    /// Queue ascending, then farthest first.
    CommonTransparent,
}

impl SortingCriteria {
    pub fn compare(self, a: (RenderQueue, f32), b: (RenderQueue, f32)) -> Ordering {
        a.0.cmp(&b.0).then_with(|| match self {
            SortingCriteria::CommonOpaque => a.1.total_cmp(&b.1),
            SortingCriteria::CommonTransparent => b.1.total_cmp(&a.1),
        })
    }
}

/// Anything the geometry pass can filter and order.
pub trait Sortable {
    fn render_queue(&self) -> RenderQueue;

    /// View-space distance used for ordering; larger is farther away.
    fn sort_key(&self) -> f32;
}

/// Select the items inside `range` and order them by `criteria`.
///
/// The sort is stable: items with equal queue and depth keep the host's
/// submission order.
pub fn filter_and_sort<T: Sortable>(
    items: &[T],
    range: RenderQueueRange,
    criteria: SortingCriteria,
) -> Vec<&T> {
    let mut selected: Vec<&T> = items
        .iter()
        .filter(|item| range.contains(item.render_queue()))
        .collect();
    selected.sort_by(|a, b| {
        criteria.compare(
            (a.render_queue(), a.sort_key()),
            (b.render_queue(), b.sort_key()),
        )
    });
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Item {
        id: u32,
        queue: RenderQueue,
        depth: f32,
    }

    impl Sortable for Item {
        fn render_queue(&self) -> RenderQueue {
            self.queue
        }

        fn sort_key(&self) -> f32 {
            self.depth
        }
    }

    fn item(id: u32, queue: RenderQueue, depth: f32) -> Item {
        Item { id, queue, depth }
    }

    fn ids(items: &[&Item]) -> Vec<u32> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_queue_classes() {
        assert!(RenderQueue::GEOMETRY.is_opaque());
        assert!(RenderQueue::ALPHA_TEST.is_opaque());
        assert!(RenderQueue(2500).is_opaque());
        assert!(RenderQueue(2501).is_transparent());
        assert!(RenderQueue::TRANSPARENT.is_transparent());
        assert!(!RenderQueue::TRANSPARENT.is_opaque());
        assert!(!RenderQueue(6000).is_opaque() && !RenderQueue(6000).is_transparent());
    }

    #[test]
    fn test_opaque_front_to_back() {
        let items = [
            item(0, RenderQueue::GEOMETRY, 10.0),
            item(1, RenderQueue::TRANSPARENT, 1.0),
            item(2, RenderQueue::GEOMETRY, 2.0),
            item(3, RenderQueue::GEOMETRY, 5.0),
        ];
        let sorted = filter_and_sort(&items, RenderQueueRange::OPAQUE, SortingCriteria::CommonOpaque);
        assert_eq!(ids(&sorted), vec![2, 3, 0]);
    }

    #[test]
    fn test_transparent_back_to_front() {
        let items = [
            item(0, RenderQueue::TRANSPARENT, 1.0),
            item(1, RenderQueue::GEOMETRY, 50.0),
            item(2, RenderQueue::TRANSPARENT, 8.0),
            item(3, RenderQueue::TRANSPARENT, 4.0),
        ];
        let sorted = filter_and_sort(
            &items,
            RenderQueueRange::TRANSPARENT,
            SortingCriteria::CommonTransparent,
        );
        assert_eq!(ids(&sorted), vec![2, 3, 0]);
    }

    #[test]
    fn test_queue_priority_beats_depth() {
        let items = [
            item(0, RenderQueue::ALPHA_TEST, 1.0),
            item(1, RenderQueue::GEOMETRY, 9.0),
            item(2, RenderQueue::BACKGROUND, 20.0),
        ];
        let sorted = filter_and_sort(&items, RenderQueueRange::OPAQUE, SortingCriteria::CommonOpaque);
        assert_eq!(ids(&sorted), vec![2, 1, 0]);
    }

    #[test]
    fn test_equal_keys_keep_submission_order() {
        let items = [
            item(0, RenderQueue::GEOMETRY, 1.0),
            item(1, RenderQueue::GEOMETRY, 1.0),
            item(2, RenderQueue::GEOMETRY, 1.0),
        ];
        let sorted = filter_and_sort(&items, RenderQueueRange::OPAQUE, SortingCriteria::CommonOpaque);
        assert_eq!(ids(&sorted), vec![0, 1, 2]);
    }

    #[test]
    fn test_nan_depth_does_not_panic() {
        let items = [
            item(0, RenderQueue::GEOMETRY, f32::NAN),
            item(1, RenderQueue::GEOMETRY, 1.0),
        ];
        let sorted = filter_and_sort(&items, RenderQueueRange::OPAQUE, SortingCriteria::CommonOpaque);
        assert_eq!(sorted.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let items: [Item; 0] = [];
        assert!(filter_and_sort(&items, RenderQueueRange::ALL, SortingCriteria::CommonOpaque).is_empty());
    }

    #[test]
    fn test_range_from_inclusive() {
        let range = RenderQueueRange::from(2000..=2100);
        assert!(range.contains(RenderQueue(2100)));
        assert!(!range.contains(RenderQueue(2101)));
    }
}
