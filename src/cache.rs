//! Classification cache: memo of "pattern type + text" to classification.
//!
//! One cache is shared by every editor on a thread, so a token classified in
//! one document is never looked up again in another. Entries are bounded by
//! an LRU policy.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::num::NonZeroUsize;
use std::rc::Rc;

use futures::future::{LocalBoxFuture, Shared};
use lru::LruCache;

use crate::error::ClassifyError;
use crate::pattern::Candidate;

/// Handle to a cache shared between engines.
pub type SharedCache = Rc<RefCell<ClassificationCache>>;

/// An outstanding lookup that any engine sharing the cache can await.
pub type SharedLookup = Shared<LocalBoxFuture<'static, Result<Candidate, ClassifyError>>>;

/// Default number of entries kept before the least recently used is evicted.
pub const DEFAULT_CAPACITY: usize = 4096;

thread_local! {
    static GLOBAL: SharedCache = Rc::new(RefCell::new(ClassificationCache::default()));
}

/// Key of a cache entry.
///
/// Displays as `type:text`, or `type[pending]:text` for the entry that stands
/// in while a lookup is outstanding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: String,
    pub text: String,
    pub pending: bool,
}

impl CacheKey {
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
            pending: false,
        }
    }

    pub fn pending(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            pending: true,
            ..Self::new(kind, text)
        }
    }

    /// The pending variant of this key.
    pub fn as_pending(&self) -> Self {
        Self {
            pending: true,
            ..self.clone()
        }
    }

    /// The final (non-pending) variant of this key.
    pub fn as_settled(&self) -> Self {
        Self {
            pending: false,
            ..self.clone()
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pending {
            write!(f, "{}[pending]:{}", self.kind, self.text)
        } else {
            write!(f, "{}:{}", self.kind, self.text)
        }
    }
}

/// The outcome of classifying one `(type, text)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub kind: String,
    pub text: String,
    pub valid: bool,
    /// Replacement text, set only when it differs from `text`.
    pub resolved_text: Option<String>,
    /// Extra data attached by the classifier, rendered as attributes.
    pub data: BTreeMap<String, String>,
    /// A lookup for this pair is still outstanding.
    pub pending: bool,
    /// The lookup failed; the pair is treated as invalid.
    pub failed: bool,
}

impl Classification {
    pub fn accepted(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
            valid: true,
            ..Self::default()
        }
    }

    pub fn rejected(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            valid: false,
            ..Self::accepted(kind, text)
        }
    }

    /// The text the document should hold for this match.
    pub fn final_text(&self) -> &str {
        self.resolved_text.as_deref().unwrap_or(&self.text)
    }
}

/// Bounded memo of classification results.
///
/// A pending entry carries the lookup that will settle it, so an engine that
/// meets a pair another engine is already classifying can wait on the same
/// lookup instead of starting its own.
pub struct ClassificationCache {
    entries: LruCache<CacheKey, Classification>,
    lookups: HashMap<CacheKey, SharedLookup>,
}

impl fmt::Debug for ClassificationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationCache")
            .field("entries", &self.entries.len())
            .field("lookups", &self.lookups.len())
            .finish()
    }
}

impl Default for ClassificationCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ClassificationCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            lookups: HashMap::new(),
        }
    }

    /// Create a cache holding at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    /// Create a new cache behind a shareable handle.
    pub fn shared(capacity: usize) -> SharedCache {
        Rc::new(RefCell::new(Self::with_capacity(capacity)))
    }

    /// The cache shared by every engine on this thread.
    pub fn global() -> SharedCache {
        GLOBAL.with(Rc::clone)
    }

    /// Look up an entry, marking it recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<&Classification> {
        self.entries.get(key)
    }

    /// Look up an entry without touching its recency.
    pub fn peek(&self, key: &CacheKey) -> Option<&Classification> {
        self.entries.peek(key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    pub fn insert(&mut self, key: CacheKey, classification: Classification) {
        self.entries.put(key, classification);
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<Classification> {
        self.lookups.remove(key);
        self.entries.pop(key)
    }

    /// Insert the pending entry for `key` along with the lookup settling it.
    pub fn insert_pending(
        &mut self,
        key: &CacheKey,
        classification: Classification,
        lookup: SharedLookup,
    ) {
        let key = key.as_pending();
        self.lookups.insert(key.clone(), lookup);
        self.entries.put(key, classification);
    }

    /// The outstanding lookup for `key`, if its pending entry is still cached.
    pub fn lookup(&self, key: &CacheKey) -> Option<SharedLookup> {
        let key = key.as_pending();
        if !self.entries.contains(&key) {
            return None;
        }
        self.lookups.get(&key).cloned()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lookups.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
