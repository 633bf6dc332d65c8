//! vnlaw-vector
//!
//! Vector indexes (LanceDB and in-memory) and the embedding-based retriever.

pub mod schema;
pub mod lance;
pub mod memory;
pub mod retriever;

pub use lance::LanceVectorIndex;
pub use memory::MemoryVectorIndex;
pub use retriever::VectorRetriever;
