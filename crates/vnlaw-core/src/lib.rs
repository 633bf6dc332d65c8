pub mod chunker;
pub mod config;
pub mod context;
pub mod error;
pub mod record;
pub mod session;
pub mod traits;
pub mod types;

pub use chunker::{ChunkStats, Chunker};
pub use context::{AssembledContext, Citation, ContextAssembler};
pub use error::{Error, Result};
pub use session::{DedupTracker, RetrievalSession};
pub use traits::{Embedder, TextBackend, VectorIndex};
pub use types::{Document, LegalMetadata, RetrievableUnit, SearchResult, StrategyKind, VectorEntry, VectorMatch};
