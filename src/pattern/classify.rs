//! The contract between the engine and a pattern's `classify` callback.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::error::ClassifyError;

/// The mutable record handed to a classifier.
///
/// A classifier may clear `valid` to reject the match, rewrite `text` to
/// replace it in the document, and add `data` entries that are rendered as
/// attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub kind: String,
    pub text: String,
    pub valid: bool,
    pub data: BTreeMap<String, String>,
}

impl Candidate {
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
            valid: true,
            data: BTreeMap::new(),
        }
    }
}

/// An outstanding lookup; resolves to the candidate after its mutations.
pub type PendingLookup = LocalBoxFuture<'static, Result<Candidate, ClassifyError>>;

/// What a classifier decided, synchronously or not.
pub enum Verdict {
    /// Keep the match with whatever mutations were made to the candidate.
    Accept,
    Reject,
    /// Decide later. The match is annotated as pending meanwhile.
    Pending(PendingLookup),
}

impl Verdict {
    pub fn pending<F>(lookup: F) -> Self
    where
        F: Future<Output = Result<Candidate, ClassifyError>> + 'static,
    {
        Verdict::Pending(lookup.boxed_local())
    }
}

impl fmt::Debug for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accept => write!(f, "Accept"),
            Verdict::Reject => write!(f, "Reject"),
            Verdict::Pending(_) => write!(f, "Pending(..)"),
        }
    }
}

/// A pattern's classifier.
pub type Classifier = Box<dyn Fn(&mut Candidate) -> Result<Verdict, ClassifyError>>;
