use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vnlaw_core::error::{Error, Result};
use vnlaw_core::traits::TextBackend;
use vnlaw_core::types::{RetrievableUnit, StrategyKind};
use vnlaw_text::{MemoryTextBackend, MultiStrategyRetriever, RetrievalStatus};

fn unit(id: &str, title: &str, body: &str) -> RetrievableUnit {
    RetrievableUnit {
        id: id.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        parent_document_id: id.to_string(),
        order_index: 0,
        metadata: Default::default(),
    }
}

fn ids(results: &[vnlaw_core::SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.unit.id.as_str()).collect()
}

const QUESTION: &str = "Phạm vi điều chỉnh của Bộ luật Dân sự là gì?";

fn civil_code_store() -> Arc<MemoryTextBackend> {
    let store = MemoryTextBackend::new();
    store
        .index(&[
            unit("bl-1", "Điều 1", &format!("Hỏi: {} Đáp: địa vị pháp lý của cá nhân.", QUESTION)),
            unit("thue-1", "Điều 2", "Người nộp thuế thu nhập cá nhân."),
            unit("bl-2", "Điều 1 (Phần 2)", &format!("{} Bộ luật này quy định quyền, nghĩa vụ.", QUESTION.to_uppercase())),
            unit("bl-3", "Hỏi đáp", &format!("Câu hỏi thường gặp: {}", QUESTION)),
            unit("bl-4", "Điều 4", &format!("Nhắc lại: {}", QUESTION)),
        ])
        .unwrap();
    Arc::new(store)
}

#[test]
fn exact_phrase_alone_fills_the_target() {
    let retriever = MultiStrategyRetriever::new(civil_code_store(), 2);
    let results = retriever.retrieve(QUESTION, 3);

    assert_eq!(ids(&results), vec!["bl-1", "bl-2", "bl-3"]);
    assert!(results.iter().all(|r| r.strategy_used == StrategyKind::ExactPhrase));
    assert!(results.iter().all(|r| r.score.is_none()));
}

#[test]
fn no_match_falls_back_to_recency() {
    let store = MemoryTextBackend::new();
    for i in 1..=5 {
        store.index(&[unit(&format!("d-{}", i), &format!("Điều {}", i), "Quy định chung về hợp đồng.")]).unwrap();
    }
    let retriever = MultiStrategyRetriever::new(Arc::new(store), 2);
    let outcome = retriever.retrieve_with_outcome("xyz123 không tồn tại", 3);

    assert_eq!(ids(&outcome.results), vec!["d-5", "d-4", "d-3"]);
    assert!(outcome.results.iter().all(|r| r.strategy_used == StrategyKind::Recency));
    assert_eq!(outcome.status, RetrievalStatus::Succeeded);
}

#[test]
fn small_store_returns_what_it_has() {
    let store = MemoryTextBackend::with_units(vec![unit("a", "A", "một"), unit("b", "B", "hai")]);
    let results = MultiStrategyRetriever::new(Arc::new(store), 2).retrieve("không có", 3);
    assert_eq!(results.len(), 2);

    let empty = MultiStrategyRetriever::new(Arc::new(MemoryTextBackend::new()), 2).retrieve("bất kỳ", 3);
    assert!(empty.is_empty());
}

#[test]
fn empty_query_degrades_to_recency() {
    let retriever = MultiStrategyRetriever::new(civil_code_store(), 2);
    let results = retriever.retrieve("   ", 2);
    assert_eq!(ids(&results), vec!["bl-4", "bl-3"]);
    assert!(results.iter().all(|r| r.strategy_used == StrategyKind::Recency));
}

#[test]
fn duplicate_hit_is_credited_to_first_strategy() {
    let store = MemoryTextBackend::with_units(vec![
        unit("A-5", "Điều 5", "Thuế thu nhập doanh nghiệp."),
        unit("B-1", "Điều 1", "Doanh nghiệp nhỏ và vừa."),
    ]);
    let retriever = MultiStrategyRetriever::new(Arc::new(store), 2);
    let results = retriever.retrieve("thu nhập doanh nghiệp", 3);

    assert_eq!(ids(&results), vec!["A-5", "B-1"]);
    assert_eq!(results[0].strategy_used, StrategyKind::ExactPhrase);
    assert_eq!(results[1].strategy_used, StrategyKind::Keyword);
}

#[test]
fn strategies_keep_their_order() {
    let store = MemoryTextBackend::with_units(vec![
        unit("k-1", "Điều 7", "Về thuế."),
        unit("old", "Điều 8", "Không liên quan."),
        unit("p-1", "Điều 9", "Thuế giá trị gia tăng áp dụng."),
        unit("new", "Điều 10", "Cũng không liên quan."),
    ]);
    let retriever = MultiStrategyRetriever::new(Arc::new(store), 2);
    let results = retriever.retrieve("giá trị gia tăng", 4);

    assert_eq!(ids(&results), vec!["p-1", "new", "old", "k-1"]);
    let kinds: Vec<StrategyKind> = results.iter().map(|r| r.strategy_used).collect();
    assert_eq!(kinds, vec![StrategyKind::ExactPhrase, StrategyKind::Recency, StrategyKind::Recency, StrategyKind::Recency]);
}

/// Backend whose calls can be switched to fail one kind at a time.
#[derive(Default)]
struct ScriptedBackend {
    inner: MemoryTextBackend,
    fail_contains: bool,
    fail_recent: bool,
    fail_first: bool,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn down() -> Self {
        Self { fail_contains: true, fail_recent: true, fail_first: true, ..Default::default() }
    }

    fn check(&self, fail: bool) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if fail { Err(Error::BackendUnavailable("connection refused".into())) } else { Ok(()) }
    }
}

impl TextBackend for ScriptedBackend {
    fn index(&self, units: &[RetrievableUnit]) -> Result<()> { self.inner.index(units) }

    fn contains(&self, needle: &str, limit: usize) -> Result<Vec<RetrievableUnit>> {
        self.check(self.fail_contains)?;
        self.inner.contains(needle, limit)
    }

    fn most_recent(&self, limit: usize) -> Result<Vec<RetrievableUnit>> {
        self.check(self.fail_recent)?;
        self.inner.most_recent(limit)
    }

    fn first(&self, limit: usize) -> Result<Vec<RetrievableUnit>> {
        self.check(self.fail_first)?;
        self.inner.first(limit)
    }
}

#[test]
fn unreachable_backend_yields_empty_list() {
    let backend = Arc::new(ScriptedBackend::down());
    let retriever = MultiStrategyRetriever::new(backend.clone(), 2);

    assert!(retriever.retrieve(QUESTION, 3).is_empty());

    let outcome = retriever.retrieve_with_outcome(QUESTION, 3);
    assert!(outcome.results.is_empty());
    match &outcome.status {
        RetrievalStatus::Failed { failures } => {
            let kinds: Vec<StrategyKind> = failures.iter().map(|f| f.strategy).collect();
            assert_eq!(kinds, vec![StrategyKind::ExactPhrase, StrategyKind::Keyword, StrategyKind::Recency, StrategyKind::Emergency]);
            assert!(failures[0].message.contains("connection refused"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn emergency_fetch_fills_in_after_failures() {
    let backend = ScriptedBackend { fail_contains: true, fail_recent: true, ..Default::default() };
    backend.inner.index(&[unit("a", "A", "một"), unit("b", "B", "hai"), unit("c", "C", "ba")]).unwrap();
    let retriever = MultiStrategyRetriever::new(Arc::new(backend), 2);

    let outcome = retriever.retrieve_with_outcome("một hai", 2);
    assert_eq!(ids(&outcome.results), vec!["a", "b"]);
    assert!(outcome.results.iter().all(|r| r.strategy_used == StrategyKind::Emergency));
    assert!(matches!(outcome.status, RetrievalStatus::Degraded { .. }));
    assert_eq!(outcome.failures().len(), 3);
}

#[test]
fn no_backend_calls_once_target_is_met() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.inner.index(&[unit("x", "Điều 1", "thuế môn bài"), unit("y", "Điều 2", "thuế môn bài")]).unwrap();
    let retriever = MultiStrategyRetriever::new(backend.clone(), 2);

    let results = retriever.retrieve("thuế môn bài", 2);
    assert_eq!(results.len(), 2);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}
