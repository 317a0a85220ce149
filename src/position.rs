//! Position types for the document.
//!
//! Internally everything is a char index into the rope. `Position` is the
//! block/offset view used at the API edge, where a block is one paragraph.

use ropey::Rope;

/// A position in the document, represented as block and offset.
///
/// Both `block` and `offset` are 0-indexed. The offset counts chars within
/// the block, embeds included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub block: usize,
    pub offset: usize,
}

impl Position {
    /// Create a new position.
    pub fn new(block: usize, offset: usize) -> Self {
        Self { block, offset }
    }

    /// Convert to a char index, clamping to the text of the block.
    pub fn to_char_index(&self, rope: &Rope) -> usize {
        let last_block = rope.len_lines().saturating_sub(1);
        let block = self.block.min(last_block);
        let start = rope.line_to_char(block);
        start + self.offset.min(block_length_excluding_break(rope, block))
    }

    /// Convert a char index back to a block/offset position.
    pub fn from_char_index(rope: &Rope, char_idx: usize) -> Self {
        let char_idx = char_idx.min(rope.len_chars());
        let block = rope.char_to_line(char_idx);
        Self::new(block, char_idx - rope.line_to_char(block))
    }
}

/// Length of a block in chars, not counting its trailing break.
pub fn block_length_excluding_break(rope: &Rope, block: usize) -> usize {
    if block >= rope.len_lines() {
        return 0;
    }
    let slice = rope.line(block);
    let mut len = slice.len_chars();
    while len > 0 && matches!(slice.char(len - 1), '\n' | '\r') {
        len -= 1;
    }
    len
}
