//! Incremental pattern annotation for rich-text documents.
//!
//! Patterns are registered with an [`Engine`]. After every document
//! transaction the engine rescans only the words the transaction touched,
//! annotating whole-token matches and classifying them through a shared
//! cache, synchronously or via a pending lookup.
//!
//! # Example
//!
//! ```rust
//! use autotag::{Editor, Engine, EngineConfig, PatternDefinition};
//!
//! let mut engine = Engine::with_config(EngineConfig::default());
//! engine.register(PatternDefinition::new("a", "CD")).unwrap();
//! engine.register(PatternDefinition::new("b", r"\w+")).unwrap();
//!
//! let mut editor = Editor::new(engine);
//! editor.load("AB CD EF");
//!
//! let found: Vec<String> = editor
//!     .document()
//!     .annotations()
//!     .into_iter()
//!     .map(|(_, annotation)| annotation.to_string())
//!     .collect();
//! assert_eq!(found, ["b:AB", "a:CD", "b:EF"]);
//!
//! // Typing right after a match does not extend it.
//! editor.set_caret(5);
//! editor.type_text(" GH");
//! assert_eq!(editor.to_string(), "AB CD GH EF");
//! assert_eq!(editor.document().annotations().len(), 4);
//! ```

pub mod builtin;
pub mod cache;
pub mod config;
pub mod document;
mod editor;
pub mod engine;
mod error;
pub mod pattern;
mod position;
pub mod render;
pub mod scan;

pub use cache::{CacheKey, Classification, ClassificationCache, SharedCache, SharedLookup};
pub use config::{EngineConfig, PatternFile, PatternSpec};
pub use document::{Annotation, Attributes, Change, Document, LiveRangeId, Status};
pub use editor::Editor;
pub use engine::{Engine, Pass};
pub use error::{ClassifyError, Error, Result};
pub use pattern::{Candidate, PatternDefinition, PatternRegistry, Priority, Verdict};
pub use position::{Position, block_length_excluding_break};
pub use render::{ConverterRegistry, Element, render_html};
