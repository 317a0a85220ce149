//! The Document type: a Rope with per-char attributes, live ranges and a caret.
//!
//! Blocks are separated by line breaks; an embed (non-text inline content) is
//! stored as [`EMBED`]. Every mutation is recorded in the open transaction's
//! change-set, which the host drains with [`Document::take_changes`].

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use ropey::Rope;

use crate::position::Position;

mod attrs;
mod change;
mod live_range;
mod selection;

pub use attrs::{AttrRuns, Annotation, Attributes, Status};
pub use change::{AttrKey, Change};
pub use live_range::{LiveRangeId, LiveRanges};
pub use selection::Selection;

/// Placeholder char standing in for an inline embed.
pub const EMBED: char = '\u{FFFC}';

/// True for chars that end a block.
pub fn is_block_break(ch: char) -> bool {
    matches!(ch, '\n' | '\r')
}

/// True for chars that are plain text (neither a block break nor an embed).
pub fn is_text_char(ch: char) -> bool {
    !is_block_break(ch) && ch != EMBED
}

/// A rich-text document.
#[derive(Debug, Default)]
pub struct Document {
    rope: Rope,
    attrs: AttrRuns,
    live: LiveRanges,
    selection: Selection,
    changes: Vec<Change>,
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rope)
    }
}

// Constructors
impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document holding `s` without recording a change.
    ///
    /// Use [`Document::insert_text`] inside a transaction when the content
    /// should be scanned.
    pub fn from_str(s: &str) -> Self {
        let rope = Rope::from_str(s);
        let mut attrs = AttrRuns::new();
        attrs.insert(0, rope.len_chars(), Attributes::default());
        Self {
            rope,
            attrs,
            ..Self::default()
        }
    }
}

// Reading
impl Document {
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    pub fn char_at(&self, idx: usize) -> Option<char> {
        self.rope.get_char(idx)
    }

    /// Text covered by `range`, clamped to the document.
    pub fn text_in(&self, range: Range<usize>) -> String {
        let end = range.end.min(self.len_chars());
        let start = range.start.min(end);
        self.rope.slice(start..end).to_string()
    }

    pub fn attributes_at(&self, idx: usize) -> Option<&Attributes> {
        self.attrs.get(idx)
    }

    pub fn format_at(&self, idx: usize) -> Option<&BTreeMap<String, String>> {
        self.attrs.get(idx).map(|attrs| &attrs.format)
    }

    pub fn annotation_at(&self, idx: usize) -> Option<&Annotation> {
        self.attrs.get(idx).and_then(|attrs| attrs.annotation.as_ref())
    }

    /// Attribute runs in document order.
    pub fn runs(&self) -> impl Iterator<Item = (Range<usize>, &Attributes)> {
        self.attrs.iter()
    }

    /// Every annotated span with its annotation, in document order.
    pub fn annotations(&self) -> Vec<(Range<usize>, Annotation)> {
        let mut spans: Vec<(Range<usize>, Annotation)> = Vec::new();
        for (range, attrs) in self.attrs.iter() {
            let Some(annotation) = &attrs.annotation else {
                continue;
            };
            match spans.last_mut() {
                Some((last, prev)) if last.end == range.start && *prev == *annotation => {
                    last.end = range.end;
                }
                _ => spans.push((range, annotation.clone())),
            }
        }
        spans
    }

    /// True when `pos` lies strictly inside a single text run of one block.
    ///
    /// Positions at a block edge, next to an embed, or on a boundary between
    /// runs with different attributes are between nodes.
    pub fn is_inside_text_run(&self, pos: usize) -> bool {
        if pos == 0 || pos >= self.len_chars() {
            return false;
        }
        let (Some(left), Some(right)) = (self.char_at(pos - 1), self.char_at(pos)) else {
            return false;
        };
        if !is_text_char(left) || !is_text_char(right) {
            return false;
        }
        self.attrs
            .run_bounds(pos - 1)
            .is_some_and(|run| run.contains(&pos))
    }

    pub fn position_of(&self, char_idx: usize) -> Position {
        Position::from_char_index(&self.rope, char_idx)
    }

    pub fn char_index_of(&self, position: Position) -> usize {
        position.to_char_index(&self.rope)
    }
}

// Transactions
impl Document {
    /// Drain the change-set recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

// Insert / Remove
impl Document {
    /// Insert `text` at `at`, every text char carrying `attrs`.
    pub fn insert_text(&mut self, at: usize, text: &str, attrs: Attributes) {
        let len = text.chars().count();
        if len == 0 {
            return;
        }
        let at = at.min(self.len_chars());
        self.rope.insert(at, text);
        self.attrs.insert(at, len, attrs);

        let structural = text.chars().any(|ch| !is_text_char(ch));
        if structural {
            // Breaks and embeds never carry character attributes.
            for (i, ch) in text.chars().enumerate() {
                if !is_text_char(ch) {
                    self.attrs
                        .update(at + i..at + i + 1, |attrs| *attrs = Attributes::default());
                }
            }
        }

        self.live.update_after_insert(at, len);
        self.selection.update_after_insert(at, len);
        for change in &mut self.changes {
            change.update_after_insert(at, len);
        }
        self.changes.push(Change::Insert {
            range: at..at + len,
            structural,
        });
    }

    /// Insert an inline embed at `at`.
    pub fn insert_embed(&mut self, at: usize) {
        self.insert_text(at, &EMBED.to_string(), Attributes::default());
    }

    /// Split the block at `at`.
    pub fn split_block(&mut self, at: usize) {
        self.insert_text(at, "\n", Attributes::default());
    }

    /// Remove the chars in `range`. Returns false if nothing was removed.
    pub fn remove(&mut self, range: Range<usize>) -> bool {
        let end = range.end.min(self.len_chars());
        let start = range.start.min(end);
        if start == end {
            return false;
        }
        self.rope.remove(start..end);
        self.attrs.remove(start..end);
        self.live.update_after_delete(start, end);
        self.selection.update_after_delete(start, end);
        for change in &mut self.changes {
            change.update_after_delete(start, end);
        }
        self.changes.push(Change::Remove {
            at: start,
            len: end - start,
        });
        true
    }

    /// Replace the chars in `range` with `text` carrying `attrs`.
    pub fn replace(&mut self, range: Range<usize>, text: &str, attrs: Attributes) {
        let start = range.start;
        self.remove(range);
        self.insert_text(start, text, attrs);
    }
}

// Attributes
impl Document {
    /// Set (or with `None`, clear) a formatting attribute over `range`.
    pub fn set_format(&mut self, range: Range<usize>, key: &str, value: Option<&str>) -> bool {
        let range = self.clamp(range);
        let changed = self.attrs.update(range.clone(), |attrs| match value {
            Some(value) => {
                attrs.format.insert(key.to_string(), value.to_string());
            }
            None => {
                attrs.format.remove(key);
            }
        });
        if changed {
            self.changes.push(Change::Attribute {
                range,
                key: AttrKey::Format(key.to_string()),
            });
        }
        changed
    }

    /// Write (or with `None`, clear) the annotation over the text chars of
    /// `range`.
    ///
    /// Records a change only if some char actually changed.
    pub fn set_annotation(&mut self, range: Range<usize>, annotation: Option<Annotation>) -> bool {
        let range = self.clamp(range);
        let mut changed = false;
        let mut start = range.start;
        while start < range.end {
            // Walk maximal runs of text chars so breaks and embeds stay bare.
            while start < range.end && !self.char_at(start).is_some_and(is_text_char) {
                start += 1;
            }
            let mut end = start;
            while end < range.end && self.char_at(end).is_some_and(is_text_char) {
                end += 1;
            }
            changed |= self
                .attrs
                .update(start..end, |attrs| attrs.annotation = annotation.clone());
            start = end;
        }
        if changed {
            self.changes.push(Change::Attribute {
                range,
                key: AttrKey::Annotation,
            });
        }
        changed
    }

    fn clamp(&self, range: Range<usize>) -> Range<usize> {
        let end = range.end.min(self.len_chars());
        range.start.min(end)..end
    }
}

// Live ranges
impl Document {
    pub fn create_live_range(&mut self, range: Range<usize>) -> LiveRangeId {
        let range = self.clamp(range);
        self.live.create(range)
    }

    pub fn live_range(&self, id: LiveRangeId) -> Option<Range<usize>> {
        self.live.get(id)
    }

    pub fn release_live_range(&mut self, id: LiveRangeId) -> Option<Range<usize>> {
        self.live.release(id)
    }

    pub fn live_range_count(&self) -> usize {
        self.live.len()
    }
}

// Selection
impl Document {
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn caret(&self) -> usize {
        self.selection.caret()
    }

    /// Move the caret, taking typing attributes from the char to its left.
    pub fn set_caret(&mut self, caret: usize) {
        self.selection.set_caret(caret.min(self.len_chars()));
        self.refresh_selection();
    }

    /// Re-derive typing attributes from the char left of the caret.
    pub fn refresh_selection(&mut self) {
        let caret = self.selection.caret().min(self.len_chars());
        self.selection.set_caret(caret);
        let attrs = match caret.checked_sub(1) {
            Some(left) if self.char_at(left).is_some_and(is_text_char) => {
                self.attrs.get(left).cloned().unwrap_or_default()
            }
            _ => Attributes::default(),
        };
        self.selection.set_attributes(attrs);
    }

    /// Drop the annotation from the typing attributes.
    ///
    /// Returns true if there was one.
    pub fn clear_typing_annotation(&mut self) -> bool {
        self.selection.attributes_mut().annotation.take().is_some()
    }

    /// Insert `text` at the caret with the typing attributes.
    pub fn type_text(&mut self, text: &str) {
        let attrs = self.selection.attributes().clone();
        self.insert_text(self.caret(), text, attrs);
    }
}
