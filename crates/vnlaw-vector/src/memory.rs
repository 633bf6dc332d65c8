use std::sync::RwLock;

use vnlaw_core::error::{Error, Result};
use vnlaw_core::traits::VectorIndex;
use vnlaw_core::types::{VectorEntry, VectorMatch};

/// Brute-force cosine index kept in memory.
pub struct MemoryVectorIndex {
    dim: usize,
    entries: RwLock<Vec<VectorEntry>>,
}

impl MemoryVectorIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, entries: RwLock::new(Vec::new()) }
    }

    pub fn len(&self) -> usize { self.entries.read().map(|e| e.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

impl VectorIndex for MemoryVectorIndex {
    fn dim(&self) -> usize { self.dim }

    fn upsert(&self, entries: &[VectorEntry]) -> Result<()> {
        let mut store = self.entries.write().map_err(|_| Error::Operation("vector index lock poisoned".into()))?;
        for entry in entries {
            if entry.vector.len() != self.dim {
                return Err(Error::InvalidInput(format!(
                    "vector for '{}' has {} values, expected {}",
                    entry.unit.id,
                    entry.vector.len(),
                    self.dim
                )));
            }
            match store.iter_mut().find(|e| e.unit.id == entry.unit.id) {
                Some(existing) => *existing = entry.clone(),
                None => store.push(entry.clone()),
            }
        }
        Ok(())
    }

    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        if vector.len() != self.dim {
            return Err(Error::InvalidInput(format!("query has {} values, expected {}", vector.len(), self.dim)));
        }
        let store = self.entries.read().map_err(|_| Error::Operation("vector index lock poisoned".into()))?;
        let mut matches: Vec<VectorMatch> = store
            .iter()
            .map(|e| VectorMatch { unit: e.unit.clone(), score: cosine(vector, &e.vector) })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }
}
