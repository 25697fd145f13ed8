//! Memory manager: what Rose remembers about the user.
//!
//! Write path: a small model decides whether a user message carries a durable
//! personal fact and rewrites it as a short third-person statement; the
//! statement is stored unless a near-identical memory already exists.
//!
//! Read path: the top-K memories most similar to the latest user message,
//! formatted as a bullet list for prompt injection.

use chrono::Utc;
use rose_core::error::{Error, MemoryError};
use rose_core::json;
use rose_core::memory::VectorStore;
use rose_core::message::{Message, Role};
use rose_core::provider::{CompletionRequest, TextGenerator};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

const MEMORY_ANALYSIS_PROMPT: &str = r#"Extract and format important personal facts about the user from their message.
Focus on the actual information, not meta-commentary or requests.

Important facts include:
- Personal details (name, age, location)
- Professional info (job, education, skills)
- Preferences (likes, dislikes, favorites)
- Life circumstances (family, relationships, pets)
- Significant experiences or achievements
- Personal goals or aspirations

Rules:
1. Only extract actual facts, not requests or commentary about remembering things.
2. Convert facts into clear, third-person statements.
3. If no actual facts are present, mark as not important.
4. Remove conversational elements and focus on the core information.

Respond with JSON only, in exactly this shape:
{"is_important": true, "formatted_memory": "Works as a nurse on night shifts"}
or
{"is_important": false, "formatted_memory": null}

Message: {message}"#;

/// The small model's verdict on one message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryAnalysis {
    pub is_important: bool,
    #[serde(default)]
    pub formatted_memory: Option<String>,
}

/// Extraction, duplicate detection, and retrieval over a [`VectorStore`].
pub struct MemoryManager {
    llm: Arc<dyn TextGenerator>,
    store: Arc<dyn VectorStore>,
    model: Option<String>,
    duplicate_threshold: f32,
    top_k: usize,
}

impl MemoryManager {
    pub fn new(llm: Arc<dyn TextGenerator>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            llm,
            store,
            model: None,
            duplicate_threshold: 0.9,
            top_k: 3,
        }
    }

    /// Model used for analysis (the provider default when unset).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_duplicate_threshold(mut self, threshold: f32) -> Self {
        self.duplicate_threshold = threshold;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Ask the model whether `text` contains something worth remembering.
    pub async fn analyze(&self, text: &str) -> Result<MemoryAnalysis, Error> {
        let prompt = MEMORY_ANALYSIS_PROMPT.replace("{message}", text);
        let mut request = CompletionRequest::new(vec![Message::user(prompt)]).with_temperature(0.1);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let raw = self.llm.complete(request).await?;
        let analysis: MemoryAnalysis = json::parse_embedded(&raw)?;
        Ok(analysis)
    }

    /// Store a durable fact from `message` if it has one and it is new.
    ///
    /// Returns the stored memory text, or `None` when nothing was stored
    /// (not a user message, nothing important, or a duplicate).
    pub async fn extract_and_store(&self, message: &Message) -> Result<Option<String>, Error> {
        if message.role != Role::User || message.content.trim().is_empty() {
            return Ok(None);
        }

        let analysis = self.analyze(&message.content).await?;
        let memory = match analysis {
            MemoryAnalysis {
                is_important: true,
                formatted_memory: Some(memory),
            } if !memory.trim().is_empty() => memory.trim().to_string(),
            _ => {
                debug!("No durable facts in message");
                return Ok(None);
            }
        };

        if let Some(existing) = self.store.search(&memory, 1).await?.into_iter().next() {
            if existing.score >= self.duplicate_threshold {
                debug!(
                    memory = %memory,
                    existing = %existing.text,
                    score = existing.score,
                    "Similar memory already stored"
                );
                return Ok(None);
            }
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("timestamp".into(), Utc::now().to_rfc3339().into());
        metadata.insert("message_id".into(), message.id.clone().into());
        self.store.store(&memory, metadata).await?;
        info!(memory = %memory, "Stored new memory");
        Ok(Some(memory))
    }

    /// Texts of the top-K memories for `context`, most relevant first.
    pub async fn relevant_memories(&self, context: &str) -> Result<Vec<String>, MemoryError> {
        if context.trim().is_empty() {
            return Ok(Vec::new());
        }
        let results = self.store.search(context, self.top_k).await?;
        debug!(count = results.len(), "Retrieved memories");
        Ok(results.into_iter().map(|m| m.text).collect())
    }

    /// Bullet list for prompt injection; empty string for no memories.
    pub fn format_for_prompt(memories: &[String]) -> String {
        memories
            .iter()
            .map(|m| format!("- {m}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
