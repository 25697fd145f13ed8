//! Embedding-backed vector store.
//!
//! Records live in memory and, when a path is given, are mirrored to a
//! JSON-lines file (one record per line) that is rewritten on every store.
//! Human-inspectable and dependency-free; fine for the few hundred facts a
//! companion accumulates about one person.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rose_core::error::MemoryError;
use rose_core::memory::{ScoredMemory, VectorStore};
use rose_core::provider::Embedder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::vector;

/// One persisted memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A [`VectorStore`] that embeds with an [`Embedder`] and ranks by cosine
/// similarity.
pub struct EmbeddingVectorStore {
    embedder: Arc<dyn Embedder>,
    path: Option<PathBuf>,
    records: RwLock<Vec<MemoryRecord>>,
}

impl EmbeddingVectorStore {
    /// A store that forgets everything when dropped.
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            path: None,
            records: RwLock::new(Vec::new()),
        }
    }

    /// A store persisted at `path`. Existing records are loaded; corrupted
    /// lines are skipped.
    pub fn open(embedder: Arc<dyn Embedder>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = records.len(), "Vector store loaded");
        Self {
            embedder,
            path: Some(path),
            records: RwLock::new(records),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn load_from_disk(path: &Path) -> Vec<MemoryRecord> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<MemoryRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted memory record");
                    None
                }
            })
            .collect()
    }

    async fn flush(&self, records: &[MemoryRecord]) -> Result<(), MemoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for record in records {
            let line = serde_json::to_string(record).map_err(|e| {
                MemoryError::Storage(format!("Failed to serialize memory record: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        tokio::fs::write(path, content)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let mut vectors = self
            .embedder
            .embed(&[text.to_string()])
            .await
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;
        vectors
            .pop()
            .ok_or_else(|| MemoryError::EmbeddingFailed("embedder returned no vectors".into()))
    }
}

#[async_trait]
impl VectorStore for EmbeddingVectorStore {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn store(
        &self,
        text: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), MemoryError> {
        let embedding = self.embed_one(text).await?;
        let record = MemoryRecord {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            embedding,
            metadata,
            created_at: Utc::now(),
        };

        // Only a record that reached disk becomes visible to search.
        let mut records = self.records.write().await;
        records.push(record);
        if let Err(e) = self.flush(&records).await {
            records.pop();
            return Err(e);
        }
        debug!(count = records.len(), "Memory stored");
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredMemory>, MemoryError> {
        if k == 0 || self.records.read().await.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embed_one(query)
            .await
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))?;

        let records = self.records.read().await;
        let ranked = vector::top_k(
            &query_embedding,
            records.iter().map(|r| r.embedding.as_slice()),
            k,
        );

        Ok(ranked
            .into_iter()
            .map(|(i, score)| ScoredMemory {
                text: records[i].text.clone(),
                score,
                metadata: records[i].metadata.clone(),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rose_core::error::ProviderError;

    /// Deterministic embedder: one dimension per keyword.
    pub(crate) struct KeywordEmbedder;

    const KEYWORDS: [&str; 5] = ["dog", "nurse", "coffee", "guitar", "paris"];

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    let mut v: Vec<f32> = KEYWORDS
                        .iter()
                        .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                        .collect();
                    // Keeps unrelated text from being a zero vector.
                    v.push(0.1);
                    v
                })
                .collect())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn name(&self) -> &str {
            "broken"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Err(ProviderError::Network("unreachable".into()))
        }
    }

    fn store() -> EmbeddingVectorStore {
        EmbeddingVectorStore::in_memory(Arc::new(KeywordEmbedder))
    }

    #[tokio::test]
    async fn search_empty_store() {
        let s = store();
        assert!(s.search("dog", 3).await.unwrap().is_empty());
        assert_eq!(s.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let s = store();
        s.store("Has a dog named Biscuit", Default::default()).await.unwrap();
        s.store("Works as a nurse", Default::default()).await.unwrap();
        s.store("Plays guitar", Default::default()).await.unwrap();

        let results = s.search("how is your dog?", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "Has a dog named Biscuit");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn metadata_is_returned() {
        let s = store();
        let mut meta = serde_json::Map::new();
        meta.insert("source".into(), serde_json::json!("chat"));
        s.store("Loves coffee", meta).await.unwrap();

        let results = s.search("coffee", 1).await.unwrap();
        assert_eq!(results[0].metadata["source"], "chat");
    }

    #[tokio::test]
    async fn embedding_failure_surfaces_as_error() {
        let s = EmbeddingVectorStore::in_memory(Arc::new(BrokenEmbedder));
        let err = s.store("anything", Default::default()).await.unwrap_err();
        assert!(matches!(err, MemoryError::EmbeddingFailed(_)));
    }

    #[tokio::test]
    async fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory").join("memories.jsonl");

        {
            let s = EmbeddingVectorStore::open(Arc::new(KeywordEmbedder), &path);
            s.store("Moving to Paris in May", Default::default()).await.unwrap();
            s.store("Has a dog", Default::default()).await.unwrap();
        }

        let reloaded = EmbeddingVectorStore::open(Arc::new(KeywordEmbedder), &path);
        assert_eq!(reloaded.count().await.unwrap(), 2);
        let results = reloaded.search("paris", 1).await.unwrap();
        assert_eq!(results[0].text, "Moving to Paris in May");
    }

    #[tokio::test]
    async fn failed_write_is_not_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let s = EmbeddingVectorStore::open(Arc::new(KeywordEmbedder), blocker.join("memories.jsonl"));
        let err = s.store("Has a dog", Default::default()).await.unwrap_err();
        assert!(matches!(err, MemoryError::Storage(_)));
        assert_eq!(s.count().await.unwrap(), 0);
        assert!(s.search("dog", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupted_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memories.jsonl");
        let good = serde_json::to_string(&MemoryRecord {
            id: "1".into(),
            text: "Plays guitar".into(),
            embedding: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.1],
            metadata: Default::default(),
            created_at: Utc::now(),
        })
        .unwrap();
        std::fs::write(&path, format!("{good}\nnot json\n\n")).unwrap();

        let s = EmbeddingVectorStore::open(Arc::new(KeywordEmbedder), &path);
        assert_eq!(s.count().await.unwrap(), 1);
    }
}
