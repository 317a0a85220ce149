//! Character attributes, stored run-length encoded alongside the rope.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Resolution status carried by an annotation while its lookup is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
        }
    }
}

/// The annotation written onto a matched text run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Annotation {
    /// Pattern type that produced the match.
    pub kind: String,
    pub status: Option<Status>,
    /// The matched (or resolved) text.
    pub text: String,
}

impl Annotation {
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            status: None,
            text: text.into(),
        }
    }

    pub fn pending(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            status: Some(Status::Pending),
            ..Self::new(kind, text)
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == Some(Status::Pending)
    }
}

/// Encoded form used at the render/export boundary: `type[status]:text`.
impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{}[{}]:{}", self.kind, status.as_str(), self.text),
            None => write!(f, "{}:{}", self.kind, self.text),
        }
    }
}

/// Attributes of a single character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    /// Character-level formatting (bold, italic, link, ...).
    pub format: BTreeMap<String, String>,
    pub annotation: Option<Annotation>,
}

impl Attributes {
    pub fn with_format(key: &str, value: &str) -> Self {
        let mut attrs = Self::default();
        attrs.format.insert(key.to_string(), value.to_string());
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Run {
    len: usize,
    attrs: Attributes,
}

/// Run-length encoded attributes, one logical entry per char of the rope.
///
/// Adjacent runs with identical attributes are always merged, so a run
/// boundary is exactly a change of attributes.
#[derive(Debug, Clone, Default)]
pub struct AttrRuns {
    runs: Vec<Run>,
}

impl AttrRuns {
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    /// Total number of chars covered.
    pub fn len(&self) -> usize {
        self.runs.iter().map(|run| run.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Attributes of the char at `idx`.
    pub fn get(&self, idx: usize) -> Option<&Attributes> {
        let mut start = 0;
        for run in &self.runs {
            if idx < start + run.len {
                return Some(&run.attrs);
            }
            start += run.len;
        }
        None
    }

    /// Char range of the run containing `idx`.
    pub fn run_bounds(&self, idx: usize) -> Option<Range<usize>> {
        let mut start = 0;
        for run in &self.runs {
            if idx < start + run.len {
                return Some(start..start + run.len);
            }
            start += run.len;
        }
        None
    }

    /// Iterate over `(range, attributes)` for every run.
    pub fn iter(&self) -> impl Iterator<Item = (Range<usize>, &Attributes)> {
        self.runs.iter().scan(0, |start, run| {
            let range = *start..*start + run.len;
            *start += run.len;
            Some((range, &run.attrs))
        })
    }

    /// Insert `len` chars carrying `attrs` at `at`.
    pub fn insert(&mut self, at: usize, len: usize, attrs: Attributes) {
        if len == 0 {
            return;
        }
        let i = self.split_at(at);
        self.runs.insert(i, Run { len, attrs });
        self.normalize();
    }

    /// Remove the chars in `range`.
    pub fn remove(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let i = self.split_at(range.start);
        let j = self.split_at(range.end);
        self.runs.drain(i..j);
        self.normalize();
    }

    /// Apply `f` to the attributes of every char in `range`.
    ///
    /// Returns true if any char's attributes actually changed.
    pub fn update(&mut self, range: Range<usize>, mut f: impl FnMut(&mut Attributes)) -> bool {
        if range.is_empty() {
            return false;
        }
        let i = self.split_at(range.start);
        let j = self.split_at(range.end);
        let mut changed = false;
        for run in &mut self.runs[i..j] {
            let before = run.attrs.clone();
            f(&mut run.attrs);
            changed |= before != run.attrs;
        }
        self.normalize();
        changed
    }

    /// Split so that a run starts at `idx`, returning that run's index.
    fn split_at(&mut self, idx: usize) -> usize {
        let mut start = 0;
        for i in 0..self.runs.len() {
            let len = self.runs[i].len;
            if idx == start {
                return i;
            }
            if idx < start + len {
                let tail = Run {
                    len: start + len - idx,
                    attrs: self.runs[i].attrs.clone(),
                };
                self.runs[i].len = idx - start;
                self.runs.insert(i + 1, tail);
                return i + 1;
            }
            start += len;
        }
        self.runs.len()
    }

    fn normalize(&mut self) {
        self.runs.retain(|run| run.len > 0);
        self.runs.dedup_by(|next, prev| {
            if next.attrs == prev.attrs {
                prev.len += next.len;
                true
            } else {
                false
            }
        });
    }
}
