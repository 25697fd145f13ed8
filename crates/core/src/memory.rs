//! Vector store trait: long-term memory about the user.
//!
//! Memories are short factual statements ("Works as a nurse on night
//! shifts") stored with an embedding and retrieved by semantic similarity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// A memory returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMemory {
    /// The stored memory text
    pub text: String,

    /// Similarity to the query (higher = closer)
    pub score: f32,

    /// Metadata recorded at store time
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// The vector-store collaborator.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "embedding", "qdrant").
    fn name(&self) -> &str;

    /// Store a memory with metadata.
    async fn store(
        &self,
        text: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), MemoryError>;

    /// The `k` stored memories most similar to `query`, by descending score.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredMemory>, MemoryError>;

    /// Number of stored memories.
    async fn count(&self) -> Result<usize, MemoryError>;
}
