//! vnlaw-rag
//!
//! Ties the pieces together: ingestion (normalize, chunk, index, embed) and
//! the query side (cascade or vector retrieval, then context assembly).

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use vnlaw_core::chunker::{ChunkStats, Chunker};
use vnlaw_core::config::{expand_path, RetrievalMode, Settings};
use vnlaw_core::context::{AssembledContext, ContextAssembler};
use vnlaw_core::record::{normalize_articles, LegalArticle};
use vnlaw_core::traits::{Embedder, TextBackend, VectorIndex};
use vnlaw_core::types::{Document, SearchResult, StrategyKind, VectorEntry};
use vnlaw_text::{MultiStrategyRetriever, RetrievalOutcome, RetrievalStatus, StrategyFailure, TantivyBackend};
use vnlaw_vector::{LanceVectorIndex, VectorRetriever};

/// Counts from one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub articles: usize,
    pub skipped: usize,
    pub documents: usize,
    pub units: usize,
    pub split_documents: usize,
    pub oversized_units: usize,
    pub embedded: usize,
    pub failed_batches: usize,
    pub failed_units: usize,
}

struct VectorSide {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    retriever: VectorRetriever,
}

pub struct RagPipeline {
    settings: Settings,
    chunker: Chunker,
    assembler: ContextAssembler,
    text: Arc<dyn TextBackend>,
    cascade: MultiStrategyRetriever,
    vector: Option<VectorSide>,
}

impl RagPipeline {
    pub fn new(settings: Settings, text: Arc<dyn TextBackend>) -> Self {
        Self {
            chunker: Chunker::from_settings(&settings.chunking),
            assembler: ContextAssembler::from_settings(&settings.context),
            cascade: MultiStrategyRetriever::from_settings(text.clone(), &settings.retrieval),
            text,
            vector: None,
            settings,
        }
    }

    pub fn with_vector(mut self, embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        let retriever = VectorRetriever::new(embedder.clone(), index.clone());
        self.vector = Some(VectorSide { embedder, index, retriever });
        self
    }

    /// Opens the on-disk Tantivy index and, when `with_vector` is set, the
    /// embedder and LanceDB table named in `settings`.
    pub fn open(settings: Settings, with_vector: bool) -> Result<Self> {
        let text_dir = expand_path(&settings.data.text_index_dir);
        let text = TantivyBackend::open(&text_dir)
            .with_context(|| format!("opening text index at {}", text_dir.display()))?;
        let mut pipeline = Self::new(settings, Arc::new(text));
        if with_vector {
            let embedder = vnlaw_embed::default_embedder(&pipeline.settings.embedding)?;
            let db_dir = expand_path(&pipeline.settings.data.vector_db_dir);
            let index = LanceVectorIndex::open(
                &db_dir,
                &pipeline.settings.data.vector_table,
                embedder.dim(),
                pipeline.settings.backend.timeout(),
            )
            .with_context(|| format!("opening vector table at {}", db_dir.display()))?;
            pipeline = pipeline.with_vector(embedder, Arc::new(index));
        }
        Ok(pipeline)
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn has_vector(&self) -> bool { self.vector.is_some() }

    pub fn chunker(&self) -> &Chunker { &self.chunker }

    pub fn retrieve(&self, query: &str, target_count: usize) -> Vec<SearchResult> {
        self.retrieve_with_outcome(query, target_count).results
    }

    /// Runs the configured retrieval mode. Vector mode without a vector side
    /// falls back to the cascade.
    pub fn retrieve_with_outcome(&self, query: &str, target_count: usize) -> RetrievalOutcome {
        match (self.settings.retrieval.mode, &self.vector) {
            (RetrievalMode::Vector, Some(side)) => match side.retriever.try_retrieve(query, target_count) {
                Ok(results) => RetrievalOutcome { results, status: RetrievalStatus::Succeeded },
                Err(e) => {
                    tracing::warn!(error = %e, "vector retrieval failed");
                    RetrievalOutcome {
                        results: Vec::new(),
                        status: RetrievalStatus::Failed {
                            failures: vec![StrategyFailure { strategy: StrategyKind::Vector, message: e.to_string() }],
                        },
                    }
                }
            },
            (RetrievalMode::Vector, None) => {
                tracing::warn!("vector mode requested without a vector index, using the text cascade");
                self.cascade.retrieve_with_outcome(query, target_count)
            }
            (RetrievalMode::Cascade, _) => self.cascade.retrieve_with_outcome(query, target_count),
        }
    }

    pub fn assemble_context(&self, results: &[SearchResult], max_units: usize) -> AssembledContext {
        self.assembler.assemble(results, max_units)
    }

    /// Retrieve with `retrieval.target_count`, assemble with `context.max_units`.
    pub fn ask(&self, query: &str) -> AssembledContext {
        let results = self.retrieve(query, self.settings.retrieval.target_count);
        self.assemble_context(&results, self.settings.context.max_units)
    }

    pub fn ingest(&self, articles: Vec<LegalArticle>) -> Result<IngestReport> {
        self.ingest_with_progress(articles, |_, _| {})
    }

    /// `on_batch(done, total)` is called after each embedding batch.
    pub fn ingest_with_progress<F>(&self, articles: Vec<LegalArticle>, on_batch: F) -> Result<IngestReport>
    where
        F: FnMut(usize, usize),
    {
        let articles_len = articles.len();
        let normalized = normalize_articles(articles, self.settings.ingest.min_body_chars);
        let mut report = self.ingest_documents(&normalized.documents, on_batch)?;
        report.articles = articles_len;
        report.skipped = normalized.skipped;
        Ok(report)
    }

    /// Chunks and indexes already-normalized documents. Text indexing errors
    /// abort the run; embedding or vector upsert failures only mark the batch
    /// as failed.
    pub fn ingest_documents<F>(&self, documents: &[Document], mut on_batch: F) -> Result<IngestReport>
    where
        F: FnMut(usize, usize),
    {
        let units = self.chunker.chunk_all(documents);
        let stats = ChunkStats::collect(documents.len(), &units, self.chunker.max_chars());
        tracing::info!(
            documents = stats.documents,
            units = stats.units,
            split = stats.split_documents,
            oversized = stats.oversized_units,
            avg_chars = stats.average_chars,
            "chunked documents"
        );
        let mut report = IngestReport {
            articles: documents.len(),
            documents: documents.len(),
            units: units.len(),
            split_documents: stats.split_documents,
            oversized_units: stats.oversized_units,
            ..Default::default()
        };

        self.text.index(&units).context("indexing units into the text backend")?;

        let Some(side) = &self.vector else {
            return Ok(report);
        };
        let batch_size = self.settings.ingest.batch_size.max(1);
        let total = units.len();
        let mut done = 0usize;
        for batch in units.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|u| u.body.clone()).collect();
            let stored = side
                .embedder
                .embed_batch(&texts)
                .and_then(|vectors| {
                    let entries: Vec<VectorEntry> = batch
                        .iter()
                        .cloned()
                        .zip(vectors)
                        .map(|(unit, vector)| VectorEntry { unit, vector })
                        .collect();
                    side.index.upsert(&entries).map(|_| entries.len())
                });
            match stored {
                Ok(n) => report.embedded += n,
                Err(e) => {
                    tracing::warn!(error = %e, batch_len = batch.len(), "embedding batch failed");
                    report.failed_batches += 1;
                    report.failed_units += batch.len();
                }
            }
            done += batch.len();
            on_batch(done, total);
        }
        tracing::info!(embedded = report.embedded, failed_batches = report.failed_batches, "vector ingestion finished");
        Ok(report)
    }
}
