//! Turning edits into the list of text regions to rescan.

use std::ops::Range;

use itertools::Itertools;

use crate::document::{Change, Document, is_text_char};

use super::expand::expand;
use super::walker::{Direction, word};

/// A contiguous run of plain text that must be (re)scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchedRegion {
    pub text: String,
    pub range: Range<usize>,
}

/// Accumulates touched ranges for one reconciliation pass.
#[derive(Debug)]
pub struct RegionCollector<'a> {
    doc: &'a Document,
    ranges: Vec<Range<usize>>,
}

impl<'a> RegionCollector<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            ranges: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Record the word enclosing `pos`, if any.
    pub fn find_word_at_position(&mut self, pos: usize) {
        let start = word(self.doc, pos, Direction::Backward);
        let end = word(self.doc, pos, Direction::Forward);
        self.push(start..end);
    }

    /// Record every maximal text run inside `range`.
    ///
    /// Block breaks and embeds separate runs and never enter one.
    pub fn find_in_range(&mut self, range: Range<usize>) {
        let end = range.end.min(self.doc.len_chars());
        let mut run_start = None;
        for idx in range.start..end {
            let is_text = self.doc.char_at(idx).is_some_and(is_text_char);
            match (is_text, run_start) {
                (true, None) => run_start = Some(idx),
                (false, Some(start)) => {
                    self.push(start..idx);
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            self.push(start..end);
        }
    }

    /// Feed one entry of a change-set.
    ///
    /// Annotation-only changes are ignored; they are the engine's own output.
    pub fn collect_change(&mut self, change: &Change) {
        match change {
            Change::Attribute { range, .. } if !change.is_annotation() => {
                self.find_word_at_position(range.start);
                self.find_word_at_position(range.end);
            }
            Change::Attribute { .. } => {}
            Change::Insert {
                range,
                structural: false,
            } => {
                self.find_in_range(expand(self.doc, range.clone()));
            }
            Change::Insert {
                range,
                structural: true,
            } => {
                self.find_in_range(range.clone());
                self.find_word_at_position(range.start);
                self.find_word_at_position(range.end);
            }
            Change::Remove { at, .. } => self.find_word_at_position(*at),
        }
    }

    pub fn collect_changes(&mut self, changes: &[Change]) {
        for change in changes {
            self.collect_change(change);
        }
    }

    /// The collected regions in document order, with overlapping or touching
    /// ranges merged so that no two regions overlap.
    pub fn finish(self) -> Vec<TouchedRegion> {
        let doc = self.doc;
        self.ranges
            .into_iter()
            .sorted_by_key(|range| (range.start, range.end))
            .coalesce(|a, b| {
                if b.start <= a.end {
                    Ok(a.start..a.end.max(b.end))
                } else {
                    Err((a, b))
                }
            })
            .map(|range| TouchedRegion {
                text: doc.text_in(range.clone()),
                range,
            })
            .collect()
    }

    fn push(&mut self, range: Range<usize>) {
        if range.is_empty() || self.ranges.contains(&range) {
            return;
        }
        self.ranges.push(range);
    }
}
