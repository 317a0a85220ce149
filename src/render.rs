//! Rendering converters: from an annotation to a renderable element.
//!
//! A single shared conversion rule exists per render target. It is installed
//! lazily, the first time any pattern registers a renderer for that target,
//! and dispatches on the annotation's type to the pattern's own renderer.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::cache::{CacheKey, ClassificationCache};
use crate::document::{Annotation, Document};

/// Attribute set of an element under construction.
pub type ElementAttrs = BTreeMap<String, String>;

/// A pattern's renderer for one target: adjusts the attributes and returns
/// the tag name.
pub type Renderer = Box<dyn Fn(&mut ElementAttrs) -> String>;

/// A materialized inline element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: ElementAttrs,
}

/// Formats the opening tag. Empty values render as bare flags.
impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attrs {
            if value.is_empty() {
                write!(f, " {key}")?;
            } else {
                write!(f, " {key}=\"{}\"", escape(value))?;
            }
        }
        write!(f, ">")
    }
}

/// Maps annotation types to renderers, per target.
#[derive(Default)]
pub struct ConverterRegistry {
    targets: HashSet<String>,
    converters: HashMap<(String, String), Renderer>,
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("targets", &self.targets)
            .field("converters", &self.converters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: &str, target: &str, renderer: Renderer) {
        if self.targets.insert(target.to_string()) {
            debug!(target_name = target, "installing annotation conversion rule");
        }
        self.converters
            .insert((kind.to_string(), target.to_string()), renderer);
    }

    /// True once some pattern registered a renderer for `target`.
    pub fn has_target(&self, target: &str) -> bool {
        self.targets.contains(target)
    }

    /// Convert `annotation` for `target`.
    ///
    /// Returns `None` when the target has no conversion rule or the
    /// annotation's type has no renderer for it.
    pub fn convert(
        &self,
        annotation: &Annotation,
        target: &str,
        cache: &ClassificationCache,
    ) -> Option<Element> {
        if !self.has_target(target) {
            return None;
        }
        let renderer = self
            .converters
            .get(&(annotation.kind.clone(), target.to_string()))?;

        let mut attrs = ElementAttrs::new();
        attrs.insert("spellcheck".to_string(), "false".to_string());
        if let Some(status) = annotation.status {
            attrs.insert(format!("status-{}", status.as_str()), String::new());
        }
        let key = CacheKey::new(annotation.kind.as_str(), annotation.text.as_str());
        let entry = if annotation.is_pending() {
            cache.peek(&key.as_pending()).or_else(|| cache.peek(&key))
        } else {
            cache.peek(&key)
        };
        if let Some(entry) = entry {
            for (name, value) in &entry.data {
                attrs.insert(format!("data-{name}"), value.clone());
            }
        }

        let tag = renderer(&mut attrs);
        Some(Element { tag, attrs })
    }
}

/// Materialize `doc` as HTML-like text, wrapping each annotated span in the
/// element its converter produces for `target`.
pub fn render_html(
    doc: &Document,
    registry: &ConverterRegistry,
    cache: &ClassificationCache,
    target: &str,
) -> String {
    let mut out = String::new();
    let mut cursor = 0;
    for (range, annotation) in doc.annotations() {
        out.push_str(&escape(&doc.text_in(cursor..range.start)));
        let text = escape(&doc.text_in(range.clone()));
        match registry.convert(&annotation, target, cache) {
            Some(element) => {
                out.push_str(&format!("{element}{text}</{}>", element.tag));
            }
            None => out.push_str(&text),
        }
        cursor = range.end;
    }
    out.push_str(&escape(&doc.text_in(cursor..doc.len_chars())));
    out
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
