//! The caret and its typing attributes.

use super::attrs::Attributes;

/// A collapsed selection: the caret position plus the attributes that newly
/// typed text will carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    caret: usize,
    attrs: Attributes,
}

impl Selection {
    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    pub(crate) fn set_caret(&mut self, caret: usize) {
        self.caret = caret;
    }

    pub(crate) fn set_attributes(&mut self, attrs: Attributes) {
        self.attrs = attrs;
    }

    pub(crate) fn update_after_insert(&mut self, at: usize, len: usize) {
        if self.caret >= at {
            self.caret += len;
        }
    }

    pub(crate) fn update_after_delete(&mut self, from: usize, to: usize) {
        if self.caret > from {
            self.caret = if self.caret < to {
                from
            } else {
                self.caret - (to - from)
            };
        }
    }
}
