use crate::error::Result;
use crate::types::{RetrievableUnit, VectorEntry, VectorMatch};

/// Embedding function: deterministic for identical input, fixed length.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Text-search backend consumed by the strategy cascade.
///
/// `contains` is a case-insensitive substring match over title and body;
/// `most_recent` returns units in descending insertion order and `first`
/// in ascending insertion order.
pub trait TextBackend: Send + Sync {
    fn index(&self, units: &[RetrievableUnit]) -> Result<()>;
    fn contains(&self, needle: &str, limit: usize) -> Result<Vec<RetrievableUnit>>;
    fn most_recent(&self, limit: usize) -> Result<Vec<RetrievableUnit>>;
    fn first(&self, limit: usize) -> Result<Vec<RetrievableUnit>>;
}

/// Similarity index over unit embeddings. Upserts are keyed by unit id.
pub trait VectorIndex: Send + Sync {
    fn dim(&self) -> usize;
    fn upsert(&self, entries: &[VectorEntry]) -> Result<()>;
    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>>;
}
