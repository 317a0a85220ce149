use tracing::trace;

use crate::document::Document;

/// Keep typed text from extending an annotation.
///
/// If the caret's typing attributes carry an annotation while the caret sits
/// between text runs rather than inside one, the annotation is dropped from
/// the typing attributes. Returns true if it was dropped.
pub fn guard_selection(doc: &mut Document) -> bool {
    if doc.selection().attributes().annotation.is_none() {
        return false;
    }
    let caret = doc.caret();
    if doc.is_inside_text_run(caret) {
        return false;
    }
    trace!(caret, "clearing annotation from typing attributes");
    doc.clear_typing_annotation()
}
