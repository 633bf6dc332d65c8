//! Individual retrieval strategies. Each one asks the backend for
//! candidates and feeds them through the session, which drops anything an
//! earlier strategy already produced.

use vnlaw_core::error::Result;
use vnlaw_core::session::RetrievalSession;
use vnlaw_core::traits::TextBackend;
use vnlaw_core::types::{RetrievableUnit, StrategyKind};

pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Adds hits to `session` until it holds `target` results. Returns the
    /// number of units this attempt accepted.
    fn attempt(&self, backend: &dyn TextBackend, query: &str, session: &mut RetrievalSession, target: usize) -> Result<usize>;
}

fn accept_all(session: &mut RetrievalSession, units: Vec<RetrievableUnit>, kind: StrategyKind, target: usize) -> usize {
    let mut accepted = 0;
    for unit in units {
        if session.is_full(target) {
            break;
        }
        if session.accept(unit, kind, None) {
            accepted += 1;
        }
    }
    accepted
}

/// Whole (trimmed) query as a case-insensitive substring of title or body.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactPhrase;

impl Strategy for ExactPhrase {
    fn kind(&self) -> StrategyKind { StrategyKind::ExactPhrase }

    fn attempt(&self, backend: &dyn TextBackend, query: &str, session: &mut RetrievalSession, target: usize) -> Result<usize> {
        let phrase = query.trim();
        if phrase.is_empty() {
            return Ok(0);
        }
        let hits = backend.contains(phrase, target)?;
        Ok(accept_all(session, hits, self.kind(), target))
    }
}

/// One lookup per query word, in query order.
#[derive(Debug, Clone, Copy)]
pub struct Keyword {
    pub min_chars: usize,
}

impl Default for Keyword {
    fn default() -> Self { Self { min_chars: 2 } }
}

impl Keyword {
    pub fn new(min_chars: usize) -> Self { Self { min_chars } }

    /// Whitespace tokens with surrounding punctuation removed, shorter ones
    /// dropped and repeats searched once.
    pub fn keywords(&self, query: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for raw in query.split_whitespace() {
            let token = raw.trim_matches(|c: char| !c.is_alphanumeric());
            if token.chars().count() < self.min_chars {
                continue;
            }
            let folded = token.to_lowercase();
            if !out.iter().any(|t| t.to_lowercase() == folded) {
                out.push(token.to_string());
            }
        }
        out
    }
}

impl Strategy for Keyword {
    fn kind(&self) -> StrategyKind { StrategyKind::Keyword }

    fn attempt(&self, backend: &dyn TextBackend, query: &str, session: &mut RetrievalSession, target: usize) -> Result<usize> {
        let mut accepted = 0;
        for keyword in self.keywords(query) {
            if session.is_full(target) {
                break;
            }
            let hits = backend.contains(&keyword, target)?;
            let n = accept_all(session, hits, self.kind(), target);
            tracing::debug!(keyword = %keyword, accepted = n, "keyword lookup");
            accepted += n;
        }
        Ok(accepted)
    }
}

/// Most recently indexed units, regardless of the query.
#[derive(Debug, Default, Clone, Copy)]
pub struct Recency;

impl Strategy for Recency {
    fn kind(&self) -> StrategyKind { StrategyKind::Recency }

    fn attempt(&self, backend: &dyn TextBackend, _query: &str, session: &mut RetrievalSession, target: usize) -> Result<usize> {
        // ask for `target` so that already-seen units can be skipped
        let hits = backend.most_recent(target)?;
        Ok(accept_all(session, hits, self.kind(), target))
    }
}
