//! The pattern set shipped by default: mentions, issue references, commit
//! hashes and emoji shortcodes.

use phf::{Map, phf_map};

use crate::engine::Engine;
use crate::error::Result;
use crate::pattern::{PatternDefinition, Priority, Verdict};

/// Emoji shortcodes. Please keep names sorted alphabetically.
const EMOJI: Map<&'static str, &'static str> = phf_map! {
    "+1" => "\u{1F44D}",
    "-1" => "\u{1F44E}",
    "bug" => "\u{1F41B}",
    "eyes" => "\u{1F440}",
    "fire" => "\u{1F525}",
    "heart" => "\u{2764}\u{FE0F}",
    "rocket" => "\u{1F680}",
    "smile" => "\u{1F604}",
    "sparkles" => "\u{2728}",
    "tada" => "\u{1F389}",
    "thinking" => "\u{1F914}",
    "warning" => "\u{26A0}\u{FE0F}",
    "wave" => "\u{1F44B}",
    "x" => "\u{274C}",
};

/// Look up an emoji by shortcode name, without the colons.
pub fn emoji(name: &str) -> Option<&'static str> {
    EMOJI.get(name).copied()
}

pub fn defaults() -> Vec<PatternDefinition> {
    vec![mention(), issue(), commit(), emoji_shortcode()]
}

/// Register every default pattern with `engine`.
pub fn register_defaults(engine: &mut Engine) -> Result<()> {
    for definition in defaults() {
        engine.register(definition)?;
    }
    Ok(())
}

fn mention() -> PatternDefinition {
    PatternDefinition::new("mention", r"@[A-Za-z0-9](?:-?[A-Za-z0-9]){0,38}")
        .classify(|candidate| {
            let login = candidate.text.trim_start_matches('@').to_string();
            candidate.data.insert("login".to_string(), login);
            Ok(Verdict::Accept)
        })
        .renderer("editing", |attrs| {
            attrs.insert("class".to_string(), "mention".to_string());
            "span".to_string()
        })
}

fn issue() -> PatternDefinition {
    PatternDefinition::new("issue", r"(?:[\w.-]+/[\w.-]+)?#\d+")
        .classify(|candidate| {
            if let Some((repo, number)) = candidate.text.split_once('#') {
                let (repo, number) = (repo.to_string(), number.to_string());
                if !repo.is_empty() {
                    candidate.data.insert("repo".to_string(), repo);
                }
                candidate.data.insert("number".to_string(), number);
            }
            Ok(Verdict::Accept)
        })
        .renderer("editing", |attrs| {
            attrs.insert("class".to_string(), "issue".to_string());
            "a".to_string()
        })
}

fn commit() -> PatternDefinition {
    PatternDefinition::new("commit", "[0-9a-f]{7,40}")
        .priority(Priority::LOW)
        .classify(|candidate| {
            // Plain words like "defaced" are hex too.
            if !candidate.text.chars().any(|ch| ch.is_ascii_digit()) {
                return Ok(Verdict::Reject);
            }
            let short: String = candidate.text.chars().take(7).collect();
            candidate.data.insert("short".to_string(), short);
            Ok(Verdict::Accept)
        })
        .renderer("editing", |attrs| {
            attrs.insert("class".to_string(), "commit".to_string());
            "code".to_string()
        })
}

fn emoji_shortcode() -> PatternDefinition {
    PatternDefinition::new("emoji", r":[a-z0-9_+-]+:")
        .classify(|candidate| {
            let name = candidate.text.trim_matches(':');
            let Some(unicode) = emoji(name) else {
                return Ok(Verdict::Reject);
            };
            candidate
                .data
                .insert("unicode".to_string(), unicode.to_string());
            Ok(Verdict::Accept)
        })
        .renderer("editing", |attrs| {
            attrs.insert("class".to_string(), "emoji".to_string());
            "span".to_string()
        })
}
