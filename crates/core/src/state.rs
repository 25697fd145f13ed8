//! The conversation state threaded through every node of a turn.
//!
//! Nodes never mutate state directly. Each node returns a [`StateUpdate`]
//! and the orchestrator applies it, which is where the state invariants live:
//! - `messages` only grows, except through [`StateUpdate::Summarized`]
//! - per-turn fields are cleared by [`ConversationState::begin_turn`]
//! - `memory_context` is always replaced wholesale, never merged

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Attachment, Message, Role};

/// The generation path chosen for a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    /// Plain text reply (the safe default)
    #[default]
    Conversation,
    /// Reply accompanied by a generated image
    Image,
    /// Reply meant primarily to be heard
    Audio,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::Conversation => "conversation",
            WorkflowType::Image => "image",
            WorkflowType::Audio => "audio",
        }
    }

    /// Parse a classification label, ignoring case and surrounding noise.
    pub fn parse(label: &str) -> Option<Self> {
        let cleaned = label
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_ascii_lowercase();
        match cleaned.as_str() {
            "conversation" => Some(WorkflowType::Conversation),
            "image" => Some(WorkflowType::Image),
            "audio" => Some(WorkflowType::Audio),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change produced by one node.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    /// The router picked the generation path for this turn.
    WorkflowSelected(WorkflowType),
    /// Schedule-derived framing for the current moment.
    ActivityInjected(Option<String>),
    /// Freshly retrieved memories, most relevant first.
    MemoryInjected(Vec<String>),
    /// A generation node produced the assistant turn.
    AssistantReplied {
        message: Message,
        image_path: Option<String>,
    },
    /// Synthesized speech for the latest assistant turn.
    AudioAttached { audio: Vec<u8>, mime: String },
    /// Older turns folded into `summary`; only the last `retained` survive.
    Summarized { summary: String, retained: usize },
    /// Node ran but had nothing to change.
    Unchanged,
}

/// The central entity of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    messages: Vec<Message>,

    /// Set once per turn by the router.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<WorkflowType>,

    /// Raw audio for the current turn (input or synthesized output).
    #[serde(skip)]
    pub audio_buffer: Option<Vec<u8>>,

    /// Generated image for the current turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    /// Memories injected for the current turn only.
    #[serde(skip)]
    pub memory_context: Vec<String>,

    /// Scheduling hint for generation prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_activity: Option<String>,

    /// Compressed account of turns no longer in `messages`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// When the last turn completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The last `n` messages, oldest first.
    pub fn recent_messages(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// The most recent user message.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// The most recent assistant message.
    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Clear every per-turn field so nothing leaks from the previous turn.
    pub fn begin_turn(&mut self) {
        self.workflow_type = None;
        self.audio_buffer = None;
        self.image_path = None;
        self.memory_context.clear();
        self.current_activity = None;
    }

    /// Append the inbound user turn.
    pub fn push_user(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Apply one node's output.
    pub fn apply(&mut self, update: StateUpdate) {
        match update {
            StateUpdate::WorkflowSelected(workflow) => {
                self.workflow_type = Some(workflow);
            }
            StateUpdate::ActivityInjected(activity) => {
                self.current_activity = activity;
            }
            StateUpdate::MemoryInjected(memories) => {
                self.memory_context = memories;
            }
            StateUpdate::AssistantReplied {
                message,
                image_path,
            } => {
                self.image_path = image_path;
                self.messages.push(message);
            }
            StateUpdate::AudioAttached { audio, mime } => {
                if let Some(last) = self
                    .messages
                    .iter_mut()
                    .rev()
                    .find(|m| m.role == Role::Assistant)
                {
                    last.attachments.push(Attachment::Audio {
                        mime,
                        byte_len: audio.len(),
                    });
                }
                self.audio_buffer = Some(audio);
            }
            StateUpdate::Summarized { summary, retained } => {
                let drop_count = self.messages.len().saturating_sub(retained);
                self.messages.drain(..drop_count);
                self.summary = Some(summary);
            }
            StateUpdate::Unchanged => {}
        }
    }

    /// Mark the turn complete.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}
