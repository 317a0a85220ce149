//! Change records collected while a transaction is open.
//!
//! Recorded positions are kept in current-document coordinates: each later
//! insert or delete in the same transaction shifts the earlier records.

use std::ops::Range;

/// Which attribute an attribute change touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrKey {
    Format(String),
    Annotation,
}

/// One structural entry of a transaction's change-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Content inserted over `range`.
    ///
    /// `structural` is set when the content contains block breaks or embeds.
    Insert { range: Range<usize>, structural: bool },
    /// `len` chars removed at `at`.
    Remove { at: usize, len: usize },
    /// An attribute changed over `range` without touching the text.
    Attribute { range: Range<usize>, key: AttrKey },
}

impl Change {
    pub fn is_annotation(&self) -> bool {
        matches!(
            self,
            Change::Attribute {
                key: AttrKey::Annotation,
                ..
            }
        )
    }

    pub(crate) fn update_after_insert(&mut self, at: usize, len: usize) {
        match self {
            Change::Insert { range, .. } | Change::Attribute { range, .. } => {
                if range.start >= at {
                    range.start += len;
                }
                if range.end > at {
                    range.end += len;
                }
                range.end = range.end.max(range.start);
            }
            Change::Remove { at: pos, .. } => {
                if *pos > at {
                    *pos += len;
                }
            }
        }
    }

    pub(crate) fn update_after_delete(&mut self, from: usize, to: usize) {
        let shift = |pos: &mut usize| {
            if *pos > from {
                *pos = if *pos < to { from } else { *pos - (to - from) };
            }
        };
        match self {
            Change::Insert { range, .. } | Change::Attribute { range, .. } => {
                shift(&mut range.start);
                shift(&mut range.end);
            }
            Change::Remove { at, .. } => shift(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_shifts_later_insert() {
        let mut change = Change::Insert {
            range: 0..1,
            structural: false,
        };
        change.update_after_insert(0, 2);
        assert_eq!(
            change,
            Change::Insert {
                range: 2..3,
                structural: false
            }
        );
        change.update_after_insert(3, 1);
        assert_eq!(
            change,
            Change::Insert {
                range: 2..3,
                structural: false
            }
        );
    }

    #[test]
    fn test_delete_clamps_remove_position() {
        let mut change = Change::Remove { at: 6, len: 2 };
        change.update_after_delete(4, 8);
        assert_eq!(change, Change::Remove { at: 4, len: 2 });
    }
}
