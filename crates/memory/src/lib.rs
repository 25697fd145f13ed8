//! Memory and persistence for Rose.
//!
//! - [`EmbeddingVectorStore`]: long-term memories ranked by cosine similarity
//! - [`MemoryManager`]: extraction with duplicate detection, retrieval, formatting
//! - [`InMemoryCheckpointStore`] / [`SqliteCheckpointStore`]: per-session state

pub mod checkpoint;
pub mod manager;
pub mod vector;
pub mod vector_store;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use checkpoint::InMemoryCheckpointStore;
pub use manager::{MemoryAnalysis, MemoryManager};
pub use vector::cosine_similarity;
pub use vector_store::{EmbeddingVectorStore, MemoryRecord};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;
