//! Engine configuration and pattern files.
//!
//! A pattern file is TOML:
//!
//! ```toml
//! [engine]
//! cache_capacity = 1024
//!
//! [[pattern]]
//! type = "ticket"
//! pattern = "[A-Z]+-\\d+"
//! priority = "high"
//! accept = ["OPS-1", "OPS-2"]
//! data = { tracker = "jira" }
//! renderers = { editing = "a" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::cache::DEFAULT_CAPACITY;
use crate::pattern::{PatternDefinition, Priority, Verdict};

/// Tunables for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of a cache created by the engine itself.
    pub cache_capacity: usize,
    /// Upper bound on queued rescans drained by one reconciliation pass.
    pub max_rescans: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            max_rescans: 64,
        }
    }
}

/// Priority as written in a pattern file: a rank name or a number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PrioritySpec {
    Value(i32),
    Rank(String),
}

/// One `[[pattern]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PatternSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub pattern: String,
    #[serde(default)]
    pub priority: Option<PrioritySpec>,
    /// If present, only these texts are valid matches.
    #[serde(default)]
    pub accept: Option<Vec<String>>,
    /// Extra data attached to every accepted match.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    /// Target name to tag name.
    #[serde(default)]
    pub renderers: BTreeMap<String, String>,
}

impl PatternSpec {
    pub fn into_definition(self) -> crate::Result<PatternDefinition> {
        let priority = match self.priority {
            None => Priority::default(),
            Some(PrioritySpec::Value(value)) => Priority(value),
            Some(PrioritySpec::Rank(rank)) => rank.parse()?,
        };

        let mut definition = PatternDefinition::new(self.kind, self.pattern).priority(priority);
        if self.accept.is_some() || !self.data.is_empty() {
            let accept = self.accept;
            let data = self.data;
            definition = definition.classify(move |candidate| {
                if let Some(accept) = &accept
                    && !accept.contains(&candidate.text)
                {
                    return Ok(Verdict::Reject);
                }
                candidate
                    .data
                    .extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(Verdict::Accept)
            });
        }
        for (target, tag) in self.renderers {
            definition = definition.renderer(target, move |_| tag.clone());
        }
        Ok(definition)
    }
}

/// The contents of a pattern file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PatternFile {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default, rename = "pattern")]
    pub patterns: Vec<PatternSpec>,
}

impl PatternFile {
    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).context("Invalid pattern file")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&source).with_context(|| format!("Failed to load {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[engine]
cache_capacity = 16

[[pattern]]
type = "ticket"
pattern = "[A-Z]+-\\d+"
priority = "high"
accept = ["OPS-1"]
data = { tracker = "jira" }
renderers = { editing = "a" }

[[pattern]]
type = "tag"
pattern = "\\+\\w+"
priority = -3
"#;

    #[test]
    fn test_parse_pattern_file() {
        let file = PatternFile::from_toml(SAMPLE).unwrap();
        assert_eq!(file.engine.cache_capacity, 16);
        assert_eq!(file.engine.max_rescans, 64);
        assert_eq!(file.patterns.len(), 2);
        assert_eq!(file.patterns[0].kind, "ticket");
        assert_eq!(file.patterns[0].priority, Some(PrioritySpec::Rank("high".to_string())));
        assert_eq!(file.patterns[1].priority, Some(PrioritySpec::Value(-3)));
        assert_eq!(file.patterns[0].renderers["editing"], "a");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = PatternFile::from_toml("").unwrap();
        assert_eq!(file.engine, EngineConfig::default());
        assert!(file.patterns.is_empty());
    }

    #[test]
    fn test_bad_priority_is_an_error() {
        let spec = PatternSpec {
            kind: "x".to_string(),
            pattern: "x".to_string(),
            priority: Some(PrioritySpec::Rank("soon".to_string())),
            accept: None,
            data: BTreeMap::new(),
            renderers: BTreeMap::new(),
        };
        assert!(spec.into_definition().is_err());
    }

    #[test]
    fn test_unknown_field_type_is_rejected() {
        assert!(PatternFile::from_toml("[[pattern]]\ntype = 3\npattern = \"x\"").is_err());
    }
}
