//! The pattern annotation engine.
//!
//! After every document transaction the engine re-derives annotation state
//! for the text the transaction touched. Work is kept in a queue of live
//! ranges so that text substitutions and late classifications can schedule
//! further scans without holding offsets that later edits invalidate.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::ops::Range;

use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use itertools::Itertools;
use tracing::{debug, trace, warn};

use crate::cache::{CacheKey, Classification, ClassificationCache, SharedCache, SharedLookup};
use crate::config::EngineConfig;
use crate::document::{Annotation, Attributes, Document, LiveRangeId};
use crate::error::{ClassifyError, Result};
use crate::pattern::{Candidate, PatternDefinition, PatternRegistry, Verdict};
use crate::render::{self, ConverterRegistry};
use crate::scan::{RegionCollector, TouchedRegion};

mod guard;

pub use guard::guard_selection;

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pass {
    /// Regions scanned, including rescans.
    pub regions: usize,
    /// Annotation writes that changed the document.
    pub annotations_written: usize,
    /// Matches whose text was substituted.
    pub replacements: usize,
    /// Scans run around substituted text.
    pub rescans: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// Exactly the queued range.
    Region,
    /// The words around the range.
    Around,
    /// The words around substituted text. Bounded by `max_rescans`.
    Substituted,
}

#[derive(Debug, Clone, Copy)]
struct Work {
    range: LiveRangeId,
    scan: Scan,
}

/// A lookup that finished, successfully or not.
struct Settlement {
    key: CacheKey,
    result: std::result::Result<Candidate, ClassifyError>,
}

/// A pattern match that survived filtering.
#[derive(Debug)]
struct Match {
    kind: String,
    range: Range<usize>,
    text: String,
}

/// What to do with a match once it is classified.
#[derive(Debug)]
enum Outcome {
    Skip,
    Annotate(Annotation),
    Replace(String, Annotation),
}

/// Annotates the documents it reconciles.
///
/// Outstanding lookups hold live ranges in the document that started them,
/// so an engine must not reconcile another document until those settle.
/// Use one engine per document and share the cache between them.
pub struct Engine {
    patterns: PatternRegistry,
    converters: ConverterRegistry,
    cache: SharedCache,
    config: EngineConfig,
    pending: FuturesUnordered<LocalBoxFuture<'static, Settlement>>,
    waiters: HashMap<CacheKey, Vec<LiveRangeId>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("patterns", &self.patterns)
            .field("converters", &self.converters)
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

// Construction and registration
impl Engine {
    /// An engine using the thread's shared cache.
    pub fn new() -> Self {
        Self {
            patterns: PatternRegistry::new(),
            converters: ConverterRegistry::new(),
            cache: ClassificationCache::global(),
            config: EngineConfig::default(),
            pending: FuturesUnordered::new(),
            waiters: HashMap::new(),
        }
    }

    /// An engine with its own cache of `config.cache_capacity` entries.
    ///
    /// The cache is not the thread's shared one. Follow with
    /// [`Engine::with_cache`] and [`ClassificationCache::global`] to share it.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            cache: ClassificationCache::shared(config.cache_capacity),
            config,
            ..Self::new()
        }
    }

    /// Replace the cache, e.g. to share one between engines.
    pub fn with_cache(mut self, cache: SharedCache) -> Self {
        self.cache = cache;
        self
    }

    /// Register a pattern and install its renderers.
    pub fn register(&mut self, definition: PatternDefinition) -> Result<()> {
        let kind = definition.kind().to_string();
        let renderers = self.patterns.register(definition)?;
        for (target, renderer) in renderers {
            self.converters.register(&kind, &target, renderer);
        }
        debug!(%kind, patterns = self.patterns.len(), "registered pattern");
        Ok(())
    }

    pub fn patterns(&self) -> &PatternRegistry {
        &self.patterns
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lookups still outstanding.
    pub fn pending_lookups(&self) -> usize {
        self.pending.len()
    }

    /// Render `doc` for `target` with this engine's converters and cache.
    pub fn render_html(&self, doc: &Document, target: &str) -> String {
        render::render_html(doc, &self.converters, &self.cache.borrow(), target)
    }
}

// Reconciliation
impl Engine {
    /// Reconcile annotations with the transaction `doc` has recorded.
    ///
    /// Does nothing when the change-set is empty. The engine's own edits are
    /// consumed before returning.
    pub fn reconcile(&mut self, doc: &mut Document) -> Pass {
        let changes = doc.take_changes();
        if changes.is_empty() {
            return Pass::default();
        }
        let mut collector = RegionCollector::new(doc);
        collector.collect_changes(&changes);
        let regions = collector.finish();
        debug!(changes = changes.len(), regions = regions.len(), "reconciling");

        let queue = regions
            .into_iter()
            .map(|region| Work {
                range: doc.create_live_range(region.range),
                scan: Scan::Region,
            })
            .collect();
        self.drain(doc, queue)
    }

    /// Rescan the words around `range` regardless of recorded changes.
    pub fn rescan(&mut self, doc: &mut Document, range: Range<usize>) -> Pass {
        self.reconcile(doc);
        let work = Work {
            range: doc.create_live_range(range),
            scan: Scan::Around,
        };
        self.drain(doc, VecDeque::from([work]))
    }

    fn drain(&mut self, doc: &mut Document, mut queue: VecDeque<Work>) -> Pass {
        let mut pass = Pass::default();
        let mut limited = false;
        while let Some(work) = queue.pop_front() {
            let Some(range) = doc.release_live_range(work.range) else {
                continue;
            };
            if work.scan == Scan::Substituted {
                if pass.rescans == self.config.max_rescans {
                    if !limited {
                        warn!(
                            max_rescans = self.config.max_rescans,
                            "rescan limit reached, skipping further substitutions"
                        );
                        limited = true;
                    }
                    continue;
                }
                pass.rescans += 1;
            }
            let region = if work.scan != Scan::Region {
                let mut collector = RegionCollector::new(doc);
                collector.find_word_at_position(range.start);
                collector.find_word_at_position(range.end);
                collector.find_in_range(range);
                let mut regions = collector.finish();
                if regions.len() > 1 {
                    for region in regions.into_iter().rev() {
                        queue.push_front(Work {
                            range: doc.create_live_range(region.range),
                            scan: Scan::Region,
                        });
                    }
                    continue;
                }
                match regions.pop() {
                    Some(region) => region,
                    None => continue,
                }
            } else {
                TouchedRegion {
                    text: doc.text_in(range.clone()),
                    range,
                }
            };

            pass.regions += 1;
            for replaced in self.scan_region(doc, &region, &mut pass) {
                queue.push_back(Work {
                    range: replaced,
                    scan: Scan::Substituted,
                });
            }
        }
        doc.take_changes();
        pass
    }

    /// Scan one region, writing annotations and substitutions.
    ///
    /// Returns live ranges over substituted text, which must be rescanned.
    fn scan_region(
        &mut self,
        doc: &mut Document,
        region: &TouchedRegion,
        pass: &mut Pass,
    ) -> Vec<LiveRangeId> {
        let matches = self.find_matches(doc, region);
        trace!(
            range = ?region.range,
            matches = matches.len(),
            "scanned region"
        );

        // Start from a clean slate; only chars whose annotation differs are written.
        let mut desired: Vec<Option<Annotation>> = vec![None; region.range.len()];
        let mut replacements = Vec::new();
        for found in matches {
            let outcome = self.resolve(doc, &found);
            trace!(kind = %found.kind, text = %found.text, ?outcome, "resolved match");
            let annotation = match outcome {
                Outcome::Skip => continue,
                Outcome::Annotate(annotation) => annotation,
                Outcome::Replace(text, annotation) => {
                    replacements.push((found.range.clone(), text, annotation.clone()));
                    annotation
                }
            };
            let offset = found.range.start - region.range.start;
            for slot in &mut desired[offset..offset + found.range.len()] {
                *slot = Some(annotation.clone());
            }
        }

        let mut at = region.range.start;
        for (count, annotation) in desired.iter().dedup_with_count() {
            if doc.set_annotation(at..at + count, annotation.clone()) {
                pass.annotations_written += 1;
            }
            at += count;
        }

        // Back to front, so earlier offsets stay valid.
        let mut replaced = Vec::with_capacity(replacements.len());
        for (range, text, annotation) in replacements.into_iter().rev() {
            let attrs = Attributes {
                format: doc.format_at(range.start).cloned().unwrap_or_default(),
                annotation: Some(annotation),
            };
            let start = range.start;
            doc.replace(range, &text, attrs);
            replaced.push(doc.create_live_range(start..start + text.chars().count()));
            pass.replacements += 1;
        }
        replaced
    }

    /// Pattern matches in `region`, in priority order, with inconsistently
    /// formatted and overlapping matches removed.
    fn find_matches(&self, doc: &Document, region: &TouchedRegion) -> Vec<Match> {
        let mut kept: Vec<Match> = Vec::new();
        for pattern in self.patterns.iter() {
            for token in pattern.find_tokens(&region.text) {
                let start = region.range.start + token.start;
                let range = start..start + token.len;
                if !uniformly_formatted(doc, range.clone()) {
                    trace!(kind = %pattern.kind, text = %token.text, "mixed formatting, skipped");
                    continue;
                }
                if kept
                    .iter()
                    .any(|earlier| earlier.range.start < range.end && range.start < earlier.range.end)
                {
                    continue;
                }
                kept.push(Match {
                    kind: pattern.kind.clone(),
                    range,
                    text: token.text,
                });
            }
        }
        kept
    }

    fn resolve(&mut self, doc: &mut Document, found: &Match) -> Outcome {
        let key = CacheKey::new(found.kind.as_str(), found.text.as_str());
        let cached = self.cache.borrow_mut().get(&key).cloned();
        if let Some(entry) = cached {
            return outcome_for(&entry);
        }
        let lookup = self.cache.borrow().lookup(&key);
        if let Some(lookup) = lookup {
            self.wait_for(doc, &key, found.range.clone(), lookup);
            return Outcome::Annotate(Annotation::pending(found.kind.as_str(), found.text.as_str()));
        }

        let Some(classify) = self
            .patterns
            .get(&found.kind)
            .and_then(|pattern| pattern.classifier())
        else {
            let entry = Classification::accepted(found.kind.as_str(), found.text.as_str());
            self.cache.borrow_mut().insert(key, entry);
            return Outcome::Annotate(Annotation::new(found.kind.as_str(), found.text.as_str()));
        };

        let mut candidate = Candidate::new(found.kind.as_str(), found.text.as_str());
        match classify(&mut candidate) {
            Ok(Verdict::Accept) => {
                let entries = settled_entries(&key, candidate);
                let outcome = outcome_for(&entries[0].1);
                let mut cache = self.cache.borrow_mut();
                for (key, entry) in entries {
                    cache.insert(key, entry);
                }
                outcome
            }
            Ok(Verdict::Reject) => {
                let entry = Classification::rejected(found.kind.as_str(), found.text.as_str());
                self.cache.borrow_mut().insert(key, entry);
                Outcome::Skip
            }
            Ok(Verdict::Pending(lookup)) => {
                let entry = Classification {
                    pending: true,
                    data: candidate.data,
                    ..Classification::accepted(found.kind.as_str(), found.text.as_str())
                };
                let lookup = lookup.shared();
                self.cache
                    .borrow_mut()
                    .insert_pending(&key, entry, lookup.clone());
                self.wait_for(doc, &key, found.range.clone(), lookup);
                debug!(%key, "classification pending");
                Outcome::Annotate(Annotation::pending(found.kind.as_str(), found.text.as_str()))
            }
            Err(err) => {
                self.record_failure(key, &err);
                Outcome::Skip
            }
        }
    }

    /// Track `range` until the lookup for `key` settles, following `lookup`
    /// unless this engine already does.
    fn wait_for(
        &mut self,
        doc: &mut Document,
        key: &CacheKey,
        range: Range<usize>,
        lookup: SharedLookup,
    ) {
        let ids = match self.waiters.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let settling = key.clone();
                self.pending.push(
                    async move {
                        Settlement {
                            key: settling,
                            result: lookup.await,
                        }
                    }
                    .boxed_local(),
                );
                entry.insert(Vec::new())
            }
        };
        if ids.iter().any(|&id| doc.live_range(id) == Some(range.clone())) {
            return;
        }
        ids.push(doc.create_live_range(range));
    }

    fn record_failure(&mut self, key: CacheKey, err: &ClassifyError) {
        warn!(%key, %err, "classification failed, leaving text unannotated");
        let entry = Classification {
            failed: true,
            ..Classification::rejected(key.kind.as_str(), key.text.as_str())
        };
        self.cache.borrow_mut().insert(key, entry);
    }
}

// Settlement
impl Engine {
    /// Apply every lookup that has already settled, each in its own pass.
    ///
    /// Returns the number applied.
    pub fn poll_classifications(&mut self, doc: &mut Document) -> usize {
        let mut applied = 0;
        while let Some(Some(settlement)) = self.pending.next().now_or_never() {
            self.apply_settlement(doc, settlement);
            applied += 1;
        }
        applied
    }

    /// Wait for outstanding lookups and apply them as they settle, until
    /// none remain.
    pub async fn settle(&mut self, doc: &mut Document) -> usize {
        let mut applied = 0;
        while let Some(settlement) = self.pending.next().await {
            self.apply_settlement(doc, settlement);
            applied += 1;
        }
        applied
    }

    fn apply_settlement(&mut self, doc: &mut Document, settlement: Settlement) -> Pass {
        // Commit whatever the host left open before starting a new transaction.
        self.reconcile(doc);

        let Settlement { key, result } = settlement;
        self.cache.borrow_mut().remove(&key.as_pending());
        // Another engine following the same lookup may have settled it first.
        let recorded = self.cache.borrow().contains(&key);
        match result {
            _ if recorded => trace!(%key, "classification already recorded"),
            Ok(candidate) => {
                let mut cache = self.cache.borrow_mut();
                for (key, entry) in settled_entries(&key, candidate) {
                    cache.insert(key, entry);
                }
            }
            Err(err) => self.record_failure(key.clone(), &err),
        }
        debug!(%key, "classification settled");

        let queue = self
            .waiters
            .remove(&key)
            .unwrap_or_default()
            .into_iter()
            .map(|range| Work {
                range,
                scan: Scan::Around,
            })
            .collect();
        self.drain(doc, queue)
    }
}

/// Cache entries for a classified candidate: the matched text, and the
/// resolved text too when the classifier changed it.
fn settled_entries(key: &CacheKey, candidate: Candidate) -> Vec<(CacheKey, Classification)> {
    let key = key.as_settled();
    let resolved = (candidate.text != key.text).then(|| candidate.text.clone());
    let entry = Classification {
        kind: key.kind.clone(),
        text: key.text.clone(),
        valid: candidate.valid,
        resolved_text: resolved.clone(),
        data: candidate.data.clone(),
        pending: false,
        failed: false,
    };

    let mut entries = vec![(key.clone(), entry)];
    if let Some(resolved) = resolved
        && candidate.valid
    {
        let alias = Classification {
            data: candidate.data,
            ..Classification::accepted(key.kind.as_str(), resolved.as_str())
        };
        entries.push((CacheKey::new(key.kind.as_str(), resolved), alias));
    }
    entries
}

fn outcome_for(entry: &Classification) -> Outcome {
    if !entry.valid {
        return Outcome::Skip;
    }
    let annotation = Annotation::new(entry.kind.as_str(), entry.final_text());
    match &entry.resolved_text {
        Some(text) => Outcome::Replace(text.clone(), annotation),
        None => Outcome::Annotate(annotation),
    }
}

/// True when every char in `range` has the formatting of the first.
fn uniformly_formatted(doc: &Document, range: Range<usize>) -> bool {
    let first = doc.format_at(range.start);
    range.skip(1).all(|idx| doc.format_at(idx) == first)
}

#[cfg(test)]
mod tests;
