use std::collections::HashSet;

use crate::types::{RetrievableUnit, SearchResult, StrategyKind};

/// Per-session set of unit ids already accepted.
#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: HashSet<String>,
}

impl DedupTracker {
    pub fn new() -> Self { Self::default() }

    pub fn seen(&self, id: &str) -> bool { self.seen.contains(id) }

    /// Marks `id` as seen; returns `false` if it already was.
    pub fn mark(&mut self, id: &str) -> bool { self.seen.insert(id.to_string()) }

    pub fn len(&self) -> usize { self.seen.len() }

    pub fn is_empty(&self) -> bool { self.seen.is_empty() }
}

/// Ephemeral state of one retrieval call. Results keep discovery order and
/// never contain the same unit id twice.
#[derive(Debug)]
pub struct RetrievalSession {
    query: String,
    tracker: DedupTracker,
    results: Vec<SearchResult>,
}

impl RetrievalSession {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), tracker: DedupTracker::new(), results: Vec::new() }
    }

    pub fn query(&self) -> &str { &self.query }

    pub fn seen(&self, id: &str) -> bool { self.tracker.seen(id) }

    /// Appends the unit unless an earlier strategy already produced it.
    pub fn accept(&mut self, unit: RetrievableUnit, strategy: StrategyKind, score: Option<f32>) -> bool {
        if !self.tracker.mark(&unit.id) {
            return false;
        }
        self.results.push(SearchResult { unit, score, strategy_used: strategy });
        true
    }

    pub fn len(&self) -> usize { self.results.len() }

    pub fn is_empty(&self) -> bool { self.results.is_empty() }

    pub fn remaining(&self, target: usize) -> usize { target.saturating_sub(self.results.len()) }

    pub fn is_full(&self, target: usize) -> bool { self.results.len() >= target }

    pub fn results(&self) -> &[SearchResult] { &self.results }

    pub fn into_results(self) -> Vec<SearchResult> { self.results }
}
