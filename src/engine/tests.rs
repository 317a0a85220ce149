use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::block_on;

use super::*;
use crate::pattern::Priority;

fn engine_with(definitions: Vec<PatternDefinition>) -> Engine {
    let mut engine = Engine::with_config(EngineConfig::default());
    for definition in definitions {
        engine.register(definition).unwrap();
    }
    engine
}

fn load(engine: &mut Engine, text: &str) -> Document {
    let mut doc = Document::new();
    doc.insert_text(0, text, Attributes::default());
    engine.reconcile(&mut doc);
    doc
}

fn spans(doc: &Document) -> Vec<(String, String)> {
    doc.annotations()
        .into_iter()
        .map(|(range, annotation)| (annotation.to_string(), doc.text_in(range)))
        .collect()
}

fn expected(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(annotation, text)| (annotation.to_string(), text.to_string()))
        .collect()
}

fn counting(calls: &Rc<Cell<usize>>) -> impl Fn(&mut Candidate) -> std::result::Result<Verdict, ClassifyError> + 'static {
    let calls = Rc::clone(calls);
    move |_| {
        calls.set(calls.get() + 1);
        Ok(Verdict::Accept)
    }
}

#[test]
fn test_earlier_registration_wins_overlap() {
    let mut engine = engine_with(vec![
        PatternDefinition::new("a", "CD"),
        PatternDefinition::new("b", r"\w+"),
    ]);
    let doc = load(&mut engine, "AB CD EF");
    assert_eq!(
        spans(&doc),
        expected(&[("b:AB", "AB"), ("a:CD", "CD"), ("b:EF", "EF")])
    );
}

#[test]
fn test_higher_priority_wins_overlap() {
    let mut engine = engine_with(vec![
        PatternDefinition::new("a", "CD"),
        PatternDefinition::new("b", r"\w+").priority(Priority::HIGH),
    ]);
    let doc = load(&mut engine, "AB CD EF");
    assert_eq!(
        spans(&doc),
        expected(&[("b:AB", "AB"), ("b:CD", "CD"), ("b:EF", "EF")])
    );
}

#[test]
fn test_empty_change_set_is_a_no_op() {
    let mut engine = engine_with(vec![PatternDefinition::new("a", "CD")]);
    let mut doc = Document::from_str("AB CD EF");
    assert_eq!(engine.reconcile(&mut doc), Pass::default());
    assert!(doc.annotations().is_empty());
}

#[test]
fn test_substring_is_not_a_token() {
    let mut engine = engine_with(vec![PatternDefinition::new("a", "CD")]);
    let doc = load(&mut engine, "ABCD EF (CD), CDs");
    assert_eq!(spans(&doc), expected(&[("a:CD", "CD")]));
    assert_eq!(doc.annotations()[0].0, 9..11);
}

#[test]
fn test_blocks_are_scanned_separately() {
    let mut engine = engine_with(vec![PatternDefinition::new("b", r"\w+")]);
    let doc = load(&mut engine, "AB\nCD");
    assert_eq!(spans(&doc), expected(&[("b:AB", "AB"), ("b:CD", "CD")]));
}

#[test]
fn test_edit_breaks_and_restores_match() {
    let mut engine = engine_with(vec![PatternDefinition::new("a", "CD")]);
    let mut doc = load(&mut engine, "AB CD EF");

    doc.insert_text(4, "x", Attributes::default());
    engine.reconcile(&mut doc);
    assert!(doc.annotations().is_empty());

    doc.remove(4..5);
    engine.reconcile(&mut doc);
    assert_eq!(spans(&doc), expected(&[("a:CD", "CD")]));
}

#[test]
fn test_deletion_merging_words_rescans() {
    let mut engine = engine_with(vec![PatternDefinition::new("a", "CDEF")]);
    let mut doc = load(&mut engine, "AB CD EF");
    assert!(doc.annotations().is_empty());
    doc.remove(5..6);
    engine.reconcile(&mut doc);
    assert_eq!(spans(&doc), expected(&[("a:CDEF", "CDEF")]));
}

#[test]
fn test_mixed_formatting_is_not_annotated() {
    let mut engine = engine_with(vec![PatternDefinition::new("a", "CD")]);
    let mut doc = load(&mut engine, "AB CD EF");

    doc.set_format(4..5, "bold", Some("true"));
    engine.reconcile(&mut doc);
    assert_eq!(doc.annotation_at(3), None);

    doc.set_format(3..4, "bold", Some("true"));
    engine.reconcile(&mut doc);
    assert_eq!(spans(&doc), expected(&[("a:CD", "CD")]));
}

#[test]
fn test_classify_called_once_per_pair() {
    let calls = Rc::new(Cell::new(0));
    let mut engine = engine_with(vec![PatternDefinition::new("a", "EF").classify(counting(&calls))]);
    let doc = load(&mut engine, "EF and EF");
    assert_eq!(calls.get(), 1);
    assert_eq!(spans(&doc), expected(&[("a:EF", "EF"), ("a:EF", "EF")]));
}

#[test]
fn test_cache_is_shared_between_engines() {
    let calls = Rc::new(Cell::new(0));
    let cache = ClassificationCache::shared(16);
    let mut first = Engine::with_config(EngineConfig::default()).with_cache(Rc::clone(&cache));
    first
        .register(PatternDefinition::new("a", "EF").classify(counting(&calls)))
        .unwrap();
    let mut second = Engine::with_config(EngineConfig::default()).with_cache(Rc::clone(&cache));
    second
        .register(PatternDefinition::new("a", "EF").classify(counting(&calls)))
        .unwrap();

    load(&mut first, "EF");
    let doc = load(&mut second, "x EF");
    assert_eq!(calls.get(), 1);
    assert_eq!(spans(&doc), expected(&[("a:EF", "EF")]));

    cache.borrow_mut().clear();
    load(&mut second, "EF");
    assert_eq!(calls.get(), 2);
}

#[test]
fn test_rejected_match_is_cached_unannotated() {
    let mut engine = engine_with(vec![PatternDefinition::new("b", r"\w+").classify(|candidate| {
        if candidate.text == "CD" {
            candidate.valid = false;
        }
        Ok(Verdict::Accept)
    })]);
    let doc = load(&mut engine, "AB CD EF");
    assert_eq!(spans(&doc), expected(&[("b:AB", "AB"), ("b:EF", "EF")]));
    let cache = engine.cache().borrow();
    let entry = cache.peek(&CacheKey::new("b", "CD")).unwrap();
    assert!(!entry.valid);
    assert!(!entry.failed);
}

#[test]
fn test_reject_verdict() {
    let mut engine = engine_with(vec![
        PatternDefinition::new("a", "CD").classify(|_| Ok(Verdict::Reject)),
        PatternDefinition::new("b", r"\w+"),
    ]);
    let doc = load(&mut engine, "AB CD EF");
    // The rejected match still claimed its span.
    assert_eq!(spans(&doc), expected(&[("b:AB", "AB"), ("b:EF", "EF")]));
}

#[test]
fn test_sync_replacement_rescans() {
    let mut engine = engine_with(vec![PatternDefinition::new("e", "EF|ef").classify(|candidate| {
        candidate.text = candidate.text.to_lowercase();
        Ok(Verdict::Accept)
    })]);
    let doc = load(&mut engine, "AB CD EF");
    assert_eq!(doc.to_string(), "AB CD ef");
    assert_eq!(spans(&doc), expected(&[("e:ef", "ef")]));
    assert_eq!(doc.live_range_count(), 0);
    assert!(!doc.has_changes());
}

#[test]
fn test_replacement_keeps_formatting() {
    let mut engine = engine_with(vec![PatternDefinition::new("e", "EF|ef").classify(|candidate| {
        candidate.text = candidate.text.to_lowercase();
        Ok(Verdict::Accept)
    })]);
    let mut doc = Document::new();
    doc.insert_text(0, "AB ", Attributes::default());
    doc.insert_text(3, "EF", Attributes::with_format("italic", "true"));
    engine.reconcile(&mut doc);
    assert_eq!(doc.to_string(), "AB ef");
    assert_eq!(doc.format_at(3).unwrap()["italic"], "true");
    assert_eq!(doc.annotation_at(4), Some(&Annotation::new("e", "ef")));
}

#[test]
fn test_rescan_limit_stops_pass() {
    let mut engine = Engine::with_config(EngineConfig {
        max_rescans: 2,
        ..EngineConfig::default()
    });
    engine
        .register(PatternDefinition::new("v", "[xy]").classify(|candidate| {
            candidate.text = "y".to_string();
            Ok(Verdict::Accept)
        }))
        .unwrap();
    let mut doc = Document::new();
    doc.insert_text(0, "x x x x x", Attributes::default());
    let pass = engine.reconcile(&mut doc);
    assert_eq!(pass.replacements, 5);
    assert_eq!(pass.rescans, 2);
    assert_eq!(doc.to_string(), "y y y y y");
    assert_eq!(doc.annotations().len(), 5);
    assert_eq!(doc.live_range_count(), 0);
}

#[test]
fn test_second_pass_writes_nothing() {
    let mut engine = engine_with(vec![
        PatternDefinition::new("a", "CD"),
        PatternDefinition::new("b", r"\w+"),
    ]);
    let mut doc = load(&mut engine, "AB CD EF");
    let before = doc.annotations();

    assert_eq!(engine.reconcile(&mut doc), Pass::default());
    let len = doc.len_chars();
    let pass = engine.rescan(&mut doc, 0..len);
    assert_eq!(pass.regions, 1);
    assert_eq!(pass.annotations_written, 0);
    assert_eq!(pass.replacements, 0);
    assert_eq!(doc.annotations(), before);
}

#[test]
fn test_sync_failure_is_isolated() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let mut engine = engine_with(vec![PatternDefinition::new("b", r"\w+").classify(move |candidate| {
        if candidate.text == "CD" {
            counter.set(counter.get() + 1);
            return Err(ClassifyError::new("lookup unavailable"));
        }
        Ok(Verdict::Accept)
    })]);
    let mut doc = load(&mut engine, "AB CD EF");
    assert_eq!(spans(&doc), expected(&[("b:AB", "AB"), ("b:EF", "EF")]));
    assert!(engine.cache().borrow().peek(&CacheKey::new("b", "CD")).unwrap().failed);

    // Not retried until the entry is dropped.
    engine.rescan(&mut doc, 3..5);
    assert_eq!(calls.get(), 1);
    engine.cache().borrow_mut().remove(&CacheKey::new("b", "CD"));
    engine.rescan(&mut doc, 3..5);
    assert_eq!(calls.get(), 2);
}

#[test]
fn test_async_replacement_survives_unrelated_edit() {
    let senders: Rc<RefCell<Vec<oneshot::Sender<()>>>> = Rc::new(RefCell::new(Vec::new()));
    let outstanding = Rc::clone(&senders);
    let mut engine = engine_with(vec![PatternDefinition::new("e", "EF|ef").classify(move |candidate| {
        let (tx, rx) = oneshot::channel();
        outstanding.borrow_mut().push(tx);
        let mut resolved = candidate.clone();
        Ok(Verdict::pending(async move {
            rx.await.map_err(|_| ClassifyError::new("lookup dropped"))?;
            resolved.text = resolved.text.to_lowercase();
            Ok::<_, ClassifyError>(resolved)
        }))
    })]);

    let mut doc = load(&mut engine, "AB CD EF");
    assert_eq!(spans(&doc), expected(&[("e[pending]:EF", "EF")]));
    assert_eq!(engine.pending_lookups(), 1);
    assert_eq!(engine.poll_classifications(&mut doc), 0);

    doc.insert_text(0, "XY ", Attributes::default());
    engine.reconcile(&mut doc);
    assert_eq!(spans(&doc), expected(&[("e[pending]:EF", "EF")]));

    senders.borrow_mut().pop().unwrap().send(()).unwrap();
    assert_eq!(engine.poll_classifications(&mut doc), 1);

    assert_eq!(doc.to_string(), "XY AB CD ef");
    assert_eq!(doc.annotation_at(9), Some(&Annotation::new("e", "ef")));
    assert_eq!(spans(&doc), expected(&[("e:ef", "ef")]));
    let cache = engine.cache().borrow();
    assert!(!cache.contains(&CacheKey::pending("e", "EF")));
    assert_eq!(
        cache.peek(&CacheKey::new("e", "EF")).unwrap().resolved_text.as_deref(),
        Some("ef")
    );
    assert_eq!(doc.live_range_count(), 0);
    assert_eq!(engine.pending_lookups(), 0);
}

#[test]
fn test_async_match_deleted_before_settling() {
    let senders: Rc<RefCell<Vec<oneshot::Sender<()>>>> = Rc::new(RefCell::new(Vec::new()));
    let outstanding = Rc::clone(&senders);
    let mut engine = engine_with(vec![PatternDefinition::new("e", "EF").classify(move |candidate| {
        let (tx, rx) = oneshot::channel();
        outstanding.borrow_mut().push(tx);
        let resolved = candidate.clone();
        Ok(Verdict::pending(async move {
            rx.await.map_err(|_| ClassifyError::new("lookup dropped"))?;
            Ok::<_, ClassifyError>(resolved)
        }))
    })]);
    let mut doc = load(&mut engine, "AB EF");
    doc.remove(2..5);
    engine.reconcile(&mut doc);

    senders.borrow_mut().pop().unwrap().send(()).unwrap();
    assert_eq!(engine.poll_classifications(&mut doc), 1);
    assert_eq!(doc.to_string(), "AB");
    assert!(doc.annotations().is_empty());
    assert_eq!(doc.live_range_count(), 0);
}

#[test]
fn test_pending_pair_shares_one_lookup() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let mut engine = engine_with(vec![PatternDefinition::new("issue", r"#\d+").classify(move |candidate| {
        counter.set(counter.get() + 1);
        let mut resolved = candidate.clone();
        Ok(Verdict::pending(async move {
            resolved.data.insert("title".to_string(), "Crash".to_string());
            Ok::<_, ClassifyError>(resolved)
        }))
    })]);
    let mut doc = load(&mut engine, "#7 and #7");
    assert_eq!(calls.get(), 1);
    assert_eq!(
        spans(&doc),
        expected(&[("issue[pending]:#7", "#7"), ("issue[pending]:#7", "#7")])
    );

    assert_eq!(block_on(engine.settle(&mut doc)), 1);
    assert_eq!(
        spans(&doc),
        expected(&[("issue:#7", "#7"), ("issue:#7", "#7")])
    );
    assert_eq!(calls.get(), 1);
}

fn issue_engine(cache: &SharedCache, calls: &Rc<Cell<usize>>) -> Engine {
    let counter = Rc::clone(calls);
    let mut engine = Engine::with_config(EngineConfig::default()).with_cache(Rc::clone(cache));
    engine
        .register(PatternDefinition::new("issue", r"#\d+").classify(move |candidate| {
            counter.set(counter.get() + 1);
            let mut resolved = candidate.clone();
            Ok(Verdict::pending(async move {
                resolved.data.insert("title".to_string(), "Crash".to_string());
                Ok::<_, ClassifyError>(resolved)
            }))
        }))
        .unwrap();
    engine
}

#[test]
fn test_pending_lookup_settles_in_every_engine() {
    let calls = Rc::new(Cell::new(0));
    let cache = ClassificationCache::shared(16);
    let mut first = issue_engine(&cache, &calls);
    let mut second = issue_engine(&cache, &calls);

    let mut doc1 = load(&mut first, "#7");
    let mut doc2 = load(&mut second, "see #7");
    assert_eq!(calls.get(), 1);
    assert_eq!(second.pending_lookups(), 1);
    assert_eq!(spans(&doc2), expected(&[("issue[pending]:#7", "#7")]));

    assert_eq!(block_on(first.settle(&mut doc1)), 1);
    assert_eq!(spans(&doc1), expected(&[("issue:#7", "#7")]));
    assert_eq!(block_on(second.settle(&mut doc2)), 1);
    assert_eq!(spans(&doc2), expected(&[("issue:#7", "#7")]));

    assert_eq!(calls.get(), 1);
    assert!(!cache.borrow().contains(&CacheKey::pending("issue", "#7")));
    assert_eq!(
        cache.borrow().peek(&CacheKey::new("issue", "#7")).unwrap().data["title"],
        "Crash"
    );
    assert_eq!(doc2.live_range_count(), 0);
}

#[test]
fn test_settlement_is_not_bounded_by_rescan_limit() {
    let calls = Rc::new(Cell::new(0));
    let cache = ClassificationCache::shared(16);
    let mut engine = issue_engine(&cache, &calls);
    assert_eq!(engine.config().max_rescans, 64);

    let text = vec!["#7"; 70].join(" ");
    let mut doc = load(&mut engine, &text);
    assert_eq!(doc.annotations().len(), 70);
    assert_eq!(calls.get(), 1);

    assert_eq!(block_on(engine.settle(&mut doc)), 1);
    let annotations = doc.annotations();
    assert_eq!(annotations.len(), 70);
    assert!(annotations.iter().all(|(_, annotation)| !annotation.is_pending()));
    assert_eq!(doc.live_range_count(), 0);
    assert!(!cache.borrow().contains(&CacheKey::pending("issue", "#7")));
}

#[test]
fn test_async_failure_leaves_text_unannotated() {
    let mut engine = engine_with(vec![PatternDefinition::new("e", "EF").classify(|_| {
        Ok(Verdict::pending(async { Err::<Candidate, _>(ClassifyError::new("offline")) }))
    })]);
    let mut doc = load(&mut engine, "AB EF");
    assert_eq!(doc.annotation_at(3), Some(&Annotation::pending("e", "EF")));

    assert_eq!(engine.poll_classifications(&mut doc), 1);
    assert!(doc.annotations().is_empty());
    let cache = engine.cache().borrow();
    let entry = cache.peek(&CacheKey::new("e", "EF")).unwrap();
    assert!(entry.failed);
    assert!(!entry.valid);
}

#[test]
fn test_pending_and_settled_rendering() {
    let mut engine = engine_with(vec![
        PatternDefinition::new("issue", r"#\d+")
            .classify(|candidate| {
                let mut resolved = candidate.clone();
                Ok(Verdict::pending(async move {
                    resolved.data.insert("title".to_string(), "Crash".to_string());
                    Ok::<_, ClassifyError>(resolved)
                }))
            })
            .renderer("editing", |_| "a".to_string()),
    ]);
    let mut doc = load(&mut engine, "see #7");
    assert_eq!(
        engine.render_html(&doc, "editing"),
        "see <a spellcheck=\"false\" status-pending>#7</a>"
    );

    block_on(engine.settle(&mut doc));
    assert_eq!(
        engine.render_html(&doc, "editing"),
        "see <a data-title=\"Crash\" spellcheck=\"false\">#7</a>"
    );
    assert_eq!(engine.render_html(&doc, "export"), "see #7");
}

#[test]
fn test_with_config_uses_private_cache() {
    let global = ClassificationCache::global();
    assert!(Rc::ptr_eq(Engine::new().cache(), &global));
    assert!(!Rc::ptr_eq(Engine::with_config(EngineConfig::default()).cache(), &global));
    let shared = Engine::with_config(EngineConfig::default()).with_cache(Rc::clone(&global));
    assert!(Rc::ptr_eq(shared.cache(), &global));
}
