//! Pattern definitions and their registry.
//!
//! A pattern's source is wrapped so that it only matches a whole delimited
//! token:
//!
//! | Part     | Requirement                                                  |
//! |----------|--------------------------------------------------------------|
//! | before   | start of text, whitespace, NBSP, `'`, `"` or `(`             |
//! | token    | the registered source                                        |
//! | after    | whitespace, NBSP or end of text, optionally preceded by      |
//! |          | closing punctuation (`)]}'".,;:?!`)                          |
//!
//! The leading delimiter is consumed but excluded from the token.

use std::fmt;

use fancy_regex::Regex;

use crate::error::{ClassifyError, Error, Result};
use crate::render::{ElementAttrs, Renderer};

pub mod classify;
pub mod priority;

pub use classify::{Candidate, Classifier, PendingLookup, Verdict};
pub use priority::Priority;

const LEADING: &str = "(?:^|[\\s\u{00A0}'\"(])";
const TRAILING: &str = "(?=[\\s\u{00A0}]|$|[)\\]}'\".,;:?!]+(?:[\\s\u{00A0}]|$))";
const TOKEN_GROUP: &str = "token";

/// A pattern as supplied by the host, before registration.
pub struct PatternDefinition {
    kind: String,
    source: String,
    priority: Priority,
    classify: Option<Classifier>,
    renderers: Vec<(String, Renderer)>,
}

impl fmt::Debug for PatternDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternDefinition")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("priority", &self.priority)
            .field("classify", &self.classify.is_some())
            .field(
                "renderers",
                &self.renderers.iter().map(|(t, _)| t).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PatternDefinition {
    pub fn new(kind: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            source: source.into(),
            priority: Priority::default(),
            classify: None,
            renderers: Vec::new(),
        }
    }

    pub fn priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn classify<F>(mut self, classify: F) -> Self
    where
        F: Fn(&mut Candidate) -> std::result::Result<Verdict, ClassifyError> + 'static,
    {
        self.classify = Some(Box::new(classify));
        self
    }

    pub fn renderer<F>(mut self, target: impl Into<String>, renderer: F) -> Self
    where
        F: Fn(&mut ElementAttrs) -> String + 'static,
    {
        self.renderers.push((target.into(), Box::new(renderer)));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// A registered, compiled pattern.
pub struct Pattern {
    pub kind: String,
    pub priority: Priority,
    regex: Regex,
    classify: Option<Classifier>,
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

/// One token found in a piece of text. Offsets are in chars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch {
    /// Char offset of the token within the scanned text.
    pub start: usize,
    pub len: usize,
    pub text: String,
    /// Chars of leading delimiter consumed before the token.
    pub delimiter_len: usize,
}

impl Pattern {
    fn compile(kind: &str, source: &str, priority: Priority) -> Result<Self> {
        let wrapped = format!("{LEADING}(?P<{TOKEN_GROUP}>(?:{source})){TRAILING}");
        let regex = Regex::new(&wrapped).map_err(|err| Error::InvalidPattern {
            kind: kind.to_string(),
            source: Box::new(err),
        })?;
        Ok(Self {
            kind: kind.to_string(),
            priority,
            regex,
            classify: None,
        })
    }

    /// Every whole-token match in `text`, in order.
    ///
    /// Matching stops early (with a trace event) if the regex engine gives up,
    /// e.g. on hitting its backtrack limit.
    pub fn find_tokens(&self, text: &str) -> Vec<TokenMatch> {
        let mut tokens = Vec::new();
        for caps in self.regex.captures_iter(text) {
            let caps = match caps {
                Ok(caps) => caps,
                Err(err) => {
                    tracing::trace!(kind = %self.kind, %err, "pattern matching aborted");
                    break;
                }
            };
            let (Some(whole), Some(token)) = (caps.get(0), caps.name(TOKEN_GROUP)) else {
                continue;
            };
            if token.as_str().is_empty() {
                continue;
            }
            let start = text[..token.start()].chars().count();
            tokens.push(TokenMatch {
                start,
                len: token.as_str().chars().count(),
                text: token.as_str().to_string(),
                delimiter_len: text[whole.start()..token.start()].chars().count(),
            });
        }
        tokens
    }

    pub fn classifier(&self) -> Option<&Classifier> {
        self.classify.as_ref()
    }
}

/// Registered patterns in scan order.
#[derive(Debug, Default)]
pub struct PatternRegistry {
    patterns: Vec<Pattern>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and compile `definition`.
    ///
    /// Returns the renderers it carried, for the caller to install. Equal
    /// priorities keep registration order.
    pub fn register(&mut self, definition: PatternDefinition) -> Result<Vec<(String, Renderer)>> {
        let PatternDefinition {
            kind,
            source,
            priority,
            classify,
            renderers,
        } = definition;

        validate_kind(&kind)?;
        if self.get(&kind).is_some() {
            return Err(Error::DuplicateType(kind));
        }

        let mut pattern = Pattern::compile(&kind, &source, priority)?;
        pattern.classify = classify;

        let at = self
            .patterns
            .iter()
            .position(|existing| existing.priority < priority)
            .unwrap_or(self.patterns.len());
        self.patterns.insert(at, pattern);
        Ok(renderers)
    }

    pub fn get(&self, kind: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|pattern| pattern.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Types end up in encoded annotation values, so the separators are reserved.
fn validate_kind(kind: &str) -> Result<()> {
    let reserved = |ch: char| ch == ':' || ch == '[' || ch == ']' || ch.is_whitespace();
    if kind.is_empty() || kind.chars().any(reserved) {
        return Err(Error::InvalidType(kind.to_string()));
    }
    Ok(())
}
