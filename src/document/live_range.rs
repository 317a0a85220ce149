//! Live ranges: tracked spans that follow the text across edits.
//!
//! A live range is addressed by id, so holders never keep offsets that may
//! have gone stale. Ranges are updated by every insert and delete applied to
//! the document and stay valid until released.

use std::ops::Range;

use slab::Slab;

/// A unique identifier for a live range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LiveRangeId(usize);

/// Arena of all live ranges in a document.
#[derive(Debug, Default)]
pub struct LiveRanges {
    ranges: Slab<Range<usize>>,
}

impl LiveRanges {
    pub fn new() -> Self {
        Self { ranges: Slab::new() }
    }

    pub fn create(&mut self, range: Range<usize>) -> LiveRangeId {
        LiveRangeId(self.ranges.insert(range))
    }

    /// Current range for `id`, or `None` once released.
    pub fn get(&self, id: LiveRangeId) -> Option<Range<usize>> {
        self.ranges.get(id.0).cloned()
    }

    pub fn release(&mut self, id: LiveRangeId) -> Option<Range<usize>> {
        self.ranges.try_remove(id.0)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Update all ranges after `len` chars were inserted at `at`.
    ///
    /// Text inserted exactly at either boundary stays outside the range.
    pub fn update_after_insert(&mut self, at: usize, len: usize) {
        for (_, range) in self.ranges.iter_mut() {
            if range.start >= at {
                range.start += len;
            }
            if range.end > at {
                range.end += len;
            }
            if range.end < range.start {
                range.end = range.start;
            }
        }
    }

    /// Update all ranges after the chars `from..to` were deleted.
    pub fn update_after_delete(&mut self, from: usize, to: usize) {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        let shift = |pos: usize| {
            if pos <= from {
                pos
            } else if pos < to {
                from
            } else {
                pos - (to - from)
            }
        };
        for (_, range) in self.ranges.iter_mut() {
            range.start = shift(range.start);
            range.end = shift(range.end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_before_shifts() {
        let mut ranges = LiveRanges::new();
        let id = ranges.create(6..8);
        ranges.update_after_insert(0, 3);
        assert_eq!(ranges.get(id), Some(9..11));
    }

    #[test]
    fn test_insert_at_boundaries_does_not_grow() {
        let mut ranges = LiveRanges::new();
        let id = ranges.create(6..8);
        ranges.update_after_insert(8, 1);
        assert_eq!(ranges.get(id), Some(6..8));
        ranges.update_after_insert(6, 1);
        assert_eq!(ranges.get(id), Some(7..9));
    }

    #[test]
    fn test_insert_inside_grows() {
        let mut ranges = LiveRanges::new();
        let id = ranges.create(6..8);
        ranges.update_after_insert(7, 2);
        assert_eq!(ranges.get(id), Some(6..10));
    }

    #[test]
    fn test_delete_updates_ranges() {
        let mut ranges = LiveRanges::new();
        let after = ranges.create(10..12);
        let overlapping = ranges.create(4..8);
        let before = ranges.create(0..2);

        ranges.update_after_delete(5, 9);

        assert_eq!(ranges.get(before), Some(0..2));
        assert_eq!(ranges.get(overlapping), Some(4..5));
        assert_eq!(ranges.get(after), Some(6..8));
    }

    #[test]
    fn test_deleted_range_collapses() {
        let mut ranges = LiveRanges::new();
        let id = ranges.create(4..6);
        ranges.update_after_delete(2, 8);
        assert_eq!(ranges.get(id), Some(2..2));
    }

    #[test]
    fn test_release_tombstones() {
        let mut ranges = LiveRanges::new();
        let id = ranges.create(1..2);
        assert_eq!(ranges.release(id), Some(1..2));
        assert_eq!(ranges.get(id), None);
        assert!(ranges.is_empty());
    }
}
