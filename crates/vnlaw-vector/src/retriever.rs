use std::cmp::Ordering;
use std::sync::Arc;

use vnlaw_core::error::{Error, Result};
use vnlaw_core::session::RetrievalSession;
use vnlaw_core::traits::{Embedder, VectorIndex};
use vnlaw_core::types::{SearchResult, StrategyKind, VectorMatch};

/// Embeds the query and asks the index for its nearest units.
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Best matches first, scores clipped to `[0, 1]`. Any failure is logged
    /// and yields an empty list.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        match self.try_retrieve(query, top_k) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, "vector retrieval failed");
                Vec::new()
            }
        }
    }

    /// Same as [`retrieve`](Self::retrieve) but reports the failure.
    pub fn try_retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query)?;
        check_embedding(&vector, self.index.dim())?;

        let mut matches = self.index.query(&vector, top_k)?;
        for m in &mut matches {
            m.score = clip(m.score);
        }
        matches.sort_by(rank);

        let mut session = RetrievalSession::new(query);
        for m in matches {
            if session.is_full(top_k) {
                break;
            }
            session.accept(m.unit, StrategyKind::Vector, Some(m.score));
        }
        tracing::debug!(results = session.len(), "vector retrieval finished");
        Ok(session.into_results())
    }
}

fn check_embedding(vector: &[f32], dim: usize) -> Result<()> {
    if vector.is_empty() {
        return Err(Error::Embedding("empty embedding".into()));
    }
    if vector.len() != dim {
        return Err(Error::Embedding(format!("embedding has {} values, index expects {}", vector.len(), dim)));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(Error::Embedding("embedding contains non-finite values".into()));
    }
    Ok(())
}

fn clip(score: f32) -> f32 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

// score desc, then order_index, then id
fn rank(a: &VectorMatch, b: &VectorMatch) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.unit.order_index.cmp(&b.unit.order_index))
        .then_with(|| a.unit.id.cmp(&b.unit.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_bounds_scores() {
        assert_eq!(clip(1.2), 1.0);
        assert_eq!(clip(-0.3), 0.0);
        assert_eq!(clip(f32::NAN), 0.0);
        assert_eq!(clip(0.42), 0.42);
    }

    #[test]
    fn malformed_embeddings_are_rejected() {
        assert!(check_embedding(&[], 3).is_err());
        assert!(check_embedding(&[0.1, 0.2], 3).is_err());
        assert!(check_embedding(&[0.1, f32::INFINITY, 0.2], 3).is_err());
        assert!(check_embedding(&[0.1, 0.2, 0.3], 3).is_ok());
    }
}
