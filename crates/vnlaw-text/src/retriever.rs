//! Ordered strategy cascade over a [`TextBackend`].
//!
//! Strategies run in order (exact phrase, keyword, recency) while the
//! session is short of `target_count`. Backend failures are logged and the
//! cascade moves on; if any call failed and the session is still short, one
//! last unconditional fetch of the first units in the store fills the gap.
//! The caller always gets a list back, empty only when the store is empty
//! or every call failed.

use std::sync::Arc;

use serde::Serialize;

use vnlaw_core::config::RetrievalSettings;
use vnlaw_core::session::RetrievalSession;
use vnlaw_core::traits::TextBackend;
use vnlaw_core::types::{SearchResult, StrategyKind};

use crate::strategy::{ExactPhrase, Keyword, Recency, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyFailure {
    pub strategy: StrategyKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RetrievalStatus {
    Succeeded,
    /// Some backend calls failed; results hold whatever the rest produced.
    Degraded { failures: Vec<StrategyFailure> },
    /// Every backend call failed.
    Failed { failures: Vec<StrategyFailure> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalOutcome {
    pub results: Vec<SearchResult>,
    pub status: RetrievalStatus,
}

impl RetrievalOutcome {
    pub fn failures(&self) -> &[StrategyFailure] {
        match &self.status {
            RetrievalStatus::Succeeded => &[],
            RetrievalStatus::Degraded { failures } | RetrievalStatus::Failed { failures } => failures,
        }
    }
}

pub struct MultiStrategyRetriever {
    backend: Arc<dyn TextBackend>,
    strategies: Vec<Box<dyn Strategy>>,
}

impl MultiStrategyRetriever {
    /// Default cascade: exact phrase, keyword, recency.
    pub fn new(backend: Arc<dyn TextBackend>, min_keyword_chars: usize) -> Self {
        Self::with_strategies(
            backend,
            vec![Box::new(ExactPhrase), Box::new(Keyword::new(min_keyword_chars)), Box::new(Recency)],
        )
    }

    pub fn from_settings(backend: Arc<dyn TextBackend>, settings: &RetrievalSettings) -> Self {
        Self::new(backend, settings.min_keyword_chars)
    }

    pub fn with_strategies(backend: Arc<dyn TextBackend>, strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { backend, strategies }
    }

    pub fn backend(&self) -> &Arc<dyn TextBackend> { &self.backend }

    pub fn retrieve(&self, query: &str, target_count: usize) -> Vec<SearchResult> {
        self.retrieve_with_outcome(query, target_count).results
    }

    pub fn retrieve_with_outcome(&self, query: &str, target_count: usize) -> RetrievalOutcome {
        let mut session = RetrievalSession::new(query);
        let mut failures = Vec::new();
        let mut attempts = 0usize;

        for strategy in &self.strategies {
            if session.is_full(target_count) {
                break;
            }
            attempts += 1;
            match strategy.attempt(self.backend.as_ref(), query, &mut session, target_count) {
                Ok(n) => tracing::debug!(strategy = %strategy.kind(), accepted = n, total = session.len(), "strategy finished"),
                Err(e) => {
                    tracing::warn!(strategy = %strategy.kind(), error = %e, "strategy failed, continuing");
                    failures.push(StrategyFailure { strategy: strategy.kind(), message: e.to_string() });
                }
            }
        }

        if !failures.is_empty() && !session.is_full(target_count) {
            attempts += 1;
            match self.backend.first(target_count) {
                Ok(units) => {
                    for unit in units {
                        if session.is_full(target_count) {
                            break;
                        }
                        session.accept(unit, StrategyKind::Emergency, None);
                    }
                    tracing::info!(total = session.len(), "emergency fallback used");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "emergency fallback failed");
                    failures.push(StrategyFailure { strategy: StrategyKind::Emergency, message: e.to_string() });
                }
            }
        }

        let status = if failures.is_empty() {
            RetrievalStatus::Succeeded
        } else if failures.len() == attempts {
            RetrievalStatus::Failed { failures }
        } else {
            RetrievalStatus::Degraded { failures }
        };
        tracing::info!(query = %query, results = session.len(), "retrieval finished");
        RetrievalOutcome { results: session.into_results(), status }
    }
}
