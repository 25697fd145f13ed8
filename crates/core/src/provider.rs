//! Provider traits: the narrow interfaces to external model services.
//!
//! Each trait covers exactly one capability so the graph can guard, swap,
//! and mock them independently: text generation, transcription, speech
//! synthesis, image generation, and embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ProviderError;
use crate::message::Message;

/// A text-generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model override; the provider's configured default is used when `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// The prompt, as an ordered list of messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            messages,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// What an image model hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageArtifact {
    /// Already persisted somewhere (local path or remote URL)
    Path(PathBuf),
    /// Raw encoded image bytes that still need a home
    Bytes(Vec<u8>),
}

/// LLM text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// A human-readable name (e.g., "groq", "openai").
    fn name(&self) -> &str;

    /// Generate a completion for the prompt.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;
}

/// Speech-to-text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    async fn transcribe(&self, audio: &[u8]) -> Result<String, ProviderError>;
}

/// Text-to-speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    /// MIME type of the audio this synthesizer produces.
    fn mime_type(&self) -> &str {
        "audio/mpeg"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Text-to-image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate_image(&self, prompt: &str) -> Result<ImageArtifact, ProviderError>;
}

/// Text embeddings for semantic memory search.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}
