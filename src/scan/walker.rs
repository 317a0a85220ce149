//! Single-char traversal that stops at non-text boundaries.

use crate::document::{Document, is_text_char};

/// Direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Punctuation that ends a word only if nothing word-like follows it.
    fn is_soft_boundary(self, ch: char) -> bool {
        match self {
            Direction::Forward => matches!(ch, '.' | ',' | ';' | ':' | '?' | '!'),
            Direction::Backward => matches!(ch, '¿' | '¡'),
        }
    }
}

/// Walks the text of one block, one char per step.
///
/// Yields `None` on reaching a block break, an embed or either end of the
/// document, and does not move past it.
#[derive(Debug, Clone)]
pub struct Walker<'a> {
    doc: &'a Document,
    pos: usize,
    direction: Direction,
}

impl<'a> Walker<'a> {
    pub fn new(doc: &'a Document, pos: usize, direction: Direction) -> Self {
        Self {
            doc,
            pos: pos.min(doc.len_chars()),
            direction,
        }
    }

    /// Current position (between chars).
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The char the next step would cross, without moving.
    pub fn peek(&self) -> Option<char> {
        let idx = match self.direction {
            Direction::Forward => self.pos,
            Direction::Backward => self.pos.checked_sub(1)?,
        };
        self.doc.char_at(idx).filter(|&ch| is_text_char(ch))
    }
}

impl Iterator for Walker<'_> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        match self.direction {
            Direction::Forward => self.pos += 1,
            Direction::Backward => self.pos -= 1,
        }
        Some(ch)
    }
}

/// Find the edge of the word at `pos` in `direction`.
///
/// Stops before whitespace. Soft boundary punctuation is only taken into the
/// word when a further word char follows it, so trailing sentence punctuation
/// stays outside while embedded punctuation stays inside.
pub fn word(doc: &Document, pos: usize, direction: Direction) -> usize {
    let mut walker = Walker::new(doc, pos, direction);
    let mut boundary = walker.position();
    while let Some(ch) = walker.peek() {
        if ch.is_whitespace() {
            break;
        }
        walker.next();
        if !direction.is_soft_boundary(ch) {
            boundary = walker.position();
        }
    }
    boundary
}
