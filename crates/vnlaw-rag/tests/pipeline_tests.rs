use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use vnlaw_core::config::{RetrievalMode, Settings};
use vnlaw_core::error::{Error, Result};
use vnlaw_core::record::parse_articles;
use vnlaw_core::traits::{Embedder, TextBackend};
use vnlaw_core::types::StrategyKind;
use vnlaw_embed::HashEmbedder;
use vnlaw_rag::RagPipeline;
use vnlaw_text::{MemoryTextBackend, RetrievalStatus};
use vnlaw_vector::MemoryVectorIndex;

const ARTICLES: &str = r#"[
    {"mapc": "91-1", "ten": "Điều 1. Phạm vi điều chỉnh",
     "noi_dung": "Bộ luật này quy định địa vị pháp lý, chuẩn mực pháp lý về cách ứng xử của cá nhân, pháp nhân.",
     "documents": {"ten": "Bộ luật Dân sự", "so_hieu": "91/2015/QH13", "loai": "Bộ luật"}},
    {"mapc": "91-2", "ten": "Điều 2. Công nhận quyền dân sự",
     "noi_dung": "Ở nước Cộng hòa xã hội chủ nghĩa Việt Nam, các quyền dân sự được công nhận, tôn trọng, bảo vệ."},
    {"mapc": "38-1", "ten": "Điều 1. Phạm vi điều chỉnh",
     "noi_dung": "Luật này quy định việc quản lý các loại thuế, các khoản thu khác thuộc ngân sách nhà nước."},
    {"mapc": "38-9", "ten": "Điều 9", "noi_dung": "Bãi bỏ."}
]"#;

fn settings() -> Settings {
    let mut s = Settings::default();
    s.embedding.dim = 128;
    s.ingest.batch_size = 2;
    s
}

fn pipeline(settings: Settings) -> RagPipeline {
    let dim = settings.embedding.dim;
    RagPipeline::new(settings, Arc::new(MemoryTextBackend::new()))
        .with_vector(Arc::new(HashEmbedder::new(dim)), Arc::new(MemoryVectorIndex::new(dim)))
}

#[test]
fn ingest_reports_counts() {
    let p = pipeline(settings());
    let mut progress = Vec::new();
    let report = p
        .ingest_with_progress(parse_articles(ARTICLES).unwrap(), |done, total| progress.push((done, total)))
        .expect("ingest");

    assert_eq!(report.articles, 4);
    assert_eq!(report.skipped, 1, "'Bãi bỏ.' is below the minimum body length");
    assert_eq!(report.documents, 3);
    assert_eq!(report.units, 3);
    assert_eq!(report.embedded, 3);
    assert_eq!(report.failed_batches, 0);
    assert_eq!(progress, vec![(2, 3), (3, 3)]);
}

#[test]
fn ask_assembles_numbered_context() {
    let p = pipeline(settings());
    p.ingest(parse_articles(ARTICLES).unwrap()).unwrap();

    let answer = p.ask("Phạm vi điều chỉnh");
    assert_eq!(answer.citations.len(), 3);
    assert_eq!(answer.citations[0].id, "91-1");
    assert_eq!(answer.citations[1].id, "38-1");
    assert!(answer.context.starts_with("1. Văn bản: Bộ luật Dân sự\nĐiều 1. Phạm vi điều chỉnh"));
    assert!(answer.context.contains("\n\n2. "));
}

#[test]
fn vector_mode_scores_results() {
    let mut s = settings();
    s.retrieval.mode = RetrievalMode::Vector;
    let p = pipeline(s);
    p.ingest(parse_articles(ARTICLES).unwrap()).unwrap();

    let outcome = p.retrieve_with_outcome("quyền dân sự được công nhận", 2);
    assert_eq!(outcome.status, RetrievalStatus::Succeeded);
    assert_eq!(outcome.results[0].unit.id, "91-2");
    assert!(outcome.results.iter().all(|r| r.strategy_used == StrategyKind::Vector && r.score.is_some()));
}

#[test]
fn vector_mode_without_index_uses_cascade() {
    let mut s = settings();
    s.retrieval.mode = RetrievalMode::Vector;
    let text = Arc::new(MemoryTextBackend::new());
    let p = RagPipeline::new(s, text.clone());
    p.ingest(parse_articles(ARTICLES).unwrap()).unwrap();

    assert!(!p.has_vector());
    let results = p.retrieve("quản lý các loại thuế", 1);
    assert_eq!(results[0].unit.id, "38-1");
    assert_eq!(results[0].strategy_used, StrategyKind::ExactPhrase);
}

/// Fails every other batch.
struct FlakyEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

impl Embedder for FlakyEmbedder {
    fn dim(&self) -> usize { self.inner.dim() }

    fn embed(&self, text: &str) -> Result<Vec<f32>> { self.inner.embed(text) }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            return Err(Error::Embedding("rate limited".into()));
        }
        texts.iter().map(|t| self.inner.embed(t)).collect()
    }
}

#[test]
fn failed_embedding_batches_are_counted_not_fatal() {
    let s = settings();
    let text = Arc::new(MemoryTextBackend::new());
    let embedder = Arc::new(FlakyEmbedder { inner: HashEmbedder::new(128), calls: AtomicUsize::new(0) });
    let p = RagPipeline::new(s, text.clone()).with_vector(embedder, Arc::new(MemoryVectorIndex::new(128)));

    let report = p.ingest(parse_articles(ARTICLES).unwrap()).unwrap();
    assert_eq!(report.failed_batches, 1);
    assert_eq!(report.failed_units, 2);
    assert_eq!(report.embedded, 1);
    // text side still has every unit
    assert_eq!(text.first(10).unwrap().len(), 3);
}

#[test]
fn long_articles_are_split_before_indexing() {
    let mut s = settings();
    s.chunking.max_chunk_chars = 60;
    let p = pipeline(s);
    let body = format!("{}\n\n{}", "Khoản 1. ".repeat(5).trim(), "Khoản 2. ".repeat(5).trim());
    let json = serde_json::json!([{ "mapc": "dài", "ten": "Điều dài", "noi_dung": body }]).to_string();

    let report = p.ingest(parse_articles(&json).unwrap()).unwrap();
    assert_eq!(report.units, 2);
    assert_eq!(report.split_documents, 1);
    let results = p.retrieve("Khoản 2", 3);
    assert_eq!(results[0].unit.id, "dài-p2");
    assert_eq!(results[0].unit.title, "Điều dài (Part 2)");
}

#[test]
fn on_disk_pipeline_round_trip() {
    let tmp = TempDir::new().unwrap();
    let mut s = settings();
    s.data.text_index_dir = tmp.path().join("tantivy").to_string_lossy().to_string();
    s.data.vector_db_dir = tmp.path().join("lancedb").to_string_lossy().to_string();

    let p = RagPipeline::open(s.clone(), true).expect("open");
    let report = p.ingest(parse_articles(ARTICLES).unwrap()).unwrap();
    assert_eq!(report.embedded, 3);
    drop(p);

    s.retrieval.mode = RetrievalMode::Vector;
    let reopened = RagPipeline::open(s, true).expect("reopen");
    let answer = reopened.ask("các quyền dân sự được công nhận");
    assert_eq!(answer.citations[0].id, "91-2");
    assert!(answer.citations[0].score.unwrap() >= answer.citations[1].score.unwrap());
}
