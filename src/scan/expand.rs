use std::ops::Range;

use crate::document::Document;

use super::walker::{Direction, word};

/// Widen `range` outwards to whole-word boundaries.
pub fn expand(doc: &Document, range: Range<usize>) -> Range<usize> {
    word(doc, range.start, Direction::Backward)..word(doc, range.end, Direction::Forward)
}
