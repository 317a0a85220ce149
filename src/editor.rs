use std::fmt;

use crate::document::{Attributes, Document};
use crate::engine::{Engine, Pass, guard_selection};

/// A document paired with the engine that annotates it.
///
/// Every transaction goes through [`Editor::change`], which reconciles
/// annotations before returning.
#[derive(Debug)]
pub struct Editor {
    document: Document,
    engine: Engine,
}

impl Editor {
    pub fn new(engine: Engine) -> Self {
        Editor {
            document: Document::new(),
            engine,
        }
    }

    /// Replace the content with `text` in one transaction.
    pub fn load(&mut self, text: &str) -> Pass {
        let len = self.document.len_chars();
        self.document.remove(0..len);
        self.document.insert_text(0, text, Attributes::default());
        let pass = self.engine.reconcile(&mut self.document);
        self.after_transaction();
        pass
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Run one transaction against the document.
    pub fn change<R>(&mut self, f: impl FnOnce(&mut Document) -> R) -> R {
        let result = f(&mut self.document);
        self.engine.reconcile(&mut self.document);
        self.after_transaction();
        result
    }

    pub fn set_caret(&mut self, caret: usize) {
        self.document.set_caret(caret);
        guard_selection(&mut self.document);
    }

    /// Insert `text` at the caret.
    pub fn type_text(&mut self, text: &str) {
        self.change(|doc| doc.type_text(text));
    }

    /// Apply lookups that have already settled.
    pub fn poll_classifications(&mut self) -> usize {
        let applied = self.engine.poll_classifications(&mut self.document);
        if applied > 0 {
            self.after_transaction();
        }
        applied
    }

    /// Wait for every outstanding lookup to settle.
    pub async fn settle(&mut self) -> usize {
        let applied = self.engine.settle(&mut self.document).await;
        self.after_transaction();
        applied
    }

    pub fn render_html(&self, target: &str) -> String {
        self.engine.render_html(&self.document, target)
    }

    fn after_transaction(&mut self) {
        self.document.refresh_selection();
        guard_selection(&mut self.document);
    }
}

impl fmt::Display for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::document::Annotation;
    use crate::pattern::PatternDefinition;

    fn editor() -> Editor {
        let mut engine = Engine::with_config(EngineConfig::default());
        engine.register(PatternDefinition::new("a", "CD")).unwrap();
        Editor::new(engine)
    }

    #[test]
    fn test_load_annotates() {
        let mut editor = editor();
        editor.load("AB CD EF");
        assert_eq!(editor.to_string(), "AB CD EF");
        assert_eq!(
            editor.document().annotation_at(3),
            Some(&Annotation::new("a", "CD"))
        );
        assert!(!editor.document().has_changes());
    }

    #[test]
    fn test_load_replaces_content() {
        let mut editor = editor();
        editor.load("CD");
        editor.load("no match");
        assert_eq!(editor.to_string(), "no match");
        assert!(editor.document().annotations().is_empty());
    }

    #[test]
    fn test_typing_after_match_does_not_extend_it() {
        let mut editor = editor();
        editor.load("AB CD EF");
        editor.set_caret(5);
        assert!(editor.document().selection().attributes().annotation.is_none());

        editor.type_text("X");
        assert_eq!(editor.to_string(), "AB CDX EF");
        assert_eq!(editor.document().annotation_at(5), None);
    }

    #[test]
    fn test_typing_a_separator_keeps_match() {
        let mut editor = editor();
        editor.load("AB CD EF");
        editor.set_caret(5);
        editor.type_text(" X");
        assert_eq!(editor.to_string(), "AB CD X EF");
        let spans: Vec<_> = editor.document().annotations();
        assert_eq!(spans, vec![(3..5, Annotation::new("a", "CD"))]);
        assert_eq!(editor.document().caret(), 7);
    }

    #[test]
    fn test_caret_inside_match_keeps_annotation() {
        let mut editor = editor();
        editor.load("AB CD EF");
        editor.set_caret(4);
        assert_eq!(
            editor.document().selection().attributes().annotation,
            Some(Annotation::new("a", "CD"))
        );
    }

    #[test]
    fn test_change_returns_closure_result() {
        let mut editor = editor();
        editor.load("AB EF");
        let removed = editor.change(|doc| doc.remove(0..3));
        assert!(removed);
        assert_eq!(editor.to_string(), "EF");
    }

    #[test]
    fn test_new_empty_editor() {
        let editor = editor();
        assert_eq!(editor.to_string(), "");
    }
}
