//! vnlaw-text
//!
//! Text-search backends (Tantivy and in-memory) and the multi-strategy
//! retrieval cascade that runs over them.

pub mod tantivy_utils;
pub mod index;
pub mod memory;
pub mod strategy;
pub mod retriever;

pub use index::TantivyBackend;
pub use memory::MemoryTextBackend;
pub use retriever::{MultiStrategyRetriever, RetrievalOutcome, RetrievalStatus, StrategyFailure};
pub use strategy::{ExactPhrase, Keyword, Recency, Strategy};
