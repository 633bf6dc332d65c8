//! Domain types shared by the chunker, the backends and the retrievers.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type UnitId = String;

/// Legal metadata carried alongside a unit so citations can name their
/// source. Every field is optional in the upstream records and defaults to
/// empty here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalMetadata {
    pub law_document_id: String,
    pub document_name: String,
    pub document_number: String,
    pub document_type: String,
    pub chapter: String,
    pub section: String,
    pub article_order: i64,
}

/// Input to the chunker: one legal article (or any text document) with a
/// stable identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub metadata: LegalMetadata,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), body: body.into(), metadata: LegalMetadata::default() }
    }
}

/// The atomic searchable object.
///
/// - `id`: unique; chunks derived from a longer document use `<parent>-p<N>`
/// - `title`: human-readable label, chunks carry a `(Part N)` suffix
/// - `body`: text payload, bounded by the chunking policy
/// - `parent_document_id`: id of the document the unit was cut from
/// - `order_index`: 0-based position within the parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievableUnit {
    pub id: UnitId,
    pub title: String,
    pub body: String,
    pub parent_document_id: String,
    pub order_index: usize,
    #[serde(default)]
    pub metadata: LegalMetadata,
}

impl RetrievableUnit {
    /// Case-insensitive substring match over title and body.
    pub fn contains_folded(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower) || self.body.to_lowercase().contains(needle_lower)
    }
}

/// Which retrieval strategy produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    ExactPhrase,
    Keyword,
    Recency,
    Emergency,
    Vector,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactPhrase => "exact-phrase",
            Self::Keyword => "keyword",
            Self::Recency => "recency",
            Self::Emergency => "emergency",
            Self::Vector => "vector",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored retrieval hit. `score` is only set by vector search; text
/// strategies are rank-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub unit: RetrievableUnit,
    pub score: Option<f32>,
    pub strategy_used: StrategyKind,
}

/// A unit paired with its embedding, as written to a vector index.
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub unit: RetrievableUnit,
    pub vector: Vec<f32>,
}

/// A nearest-neighbour match returned by a vector index. `score` is the
/// cosine similarity reported by the index, not yet clipped.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub unit: RetrievableUnit,
    pub score: f32,
}
