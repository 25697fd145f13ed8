//! # Rose Core
//!
//! Domain types, collaborator traits, and error definitions for the Rose
//! voice companion. This crate has **no framework dependencies**: it defines
//! the conversation model every other crate works against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (LLM, speech-to-text, text-to-speech, image
//! model, embeddings, vector store, checkpoint store) is a trait here.
//! Implementations live in their respective crates. This enables:
//! - Injecting providers explicitly instead of reaching for globals
//! - Testing every node with scripted mock providers
//! - Clean dependency graph (all crates depend inward on core)

pub mod checkpoint;
pub mod error;
pub mod json;
pub mod memory;
pub mod message;
pub mod provider;
pub mod state;

// Re-export key types at crate root for ergonomics
pub use checkpoint::CheckpointStore;
pub use error::{CheckpointError, CircuitOpenError, Error, MemoryError, ProviderError, Result};
pub use memory::{ScoredMemory, VectorStore};
pub use message::{Attachment, Message, Role, SessionId};
pub use provider::{
    CompletionRequest, Embedder, ImageArtifact, ImageGenerator, SpeechSynthesizer, TextGenerator,
    Transcriber,
};
pub use state::{ConversationState, StateUpdate, WorkflowType};
