//! Graph nodes.
//!
//! Every node is an async function over a read-only view of the state that
//! returns a [`NodeOutput`]. Nodes absorb their own provider failures: a
//! failed call becomes a degraded-but-valid update, never an error.
//!
//! The edges are fixed; the only branch is the generation node, chosen by
//! the router's `workflow_type`:
//!
//! ```text
//! memory_extraction → router → context_injection → memory_injection
//!     → conversation | image | audio → speech → summarize → end
//! ```

pub mod audio;
pub mod context;
pub mod conversation;
pub mod image;
pub mod memory;
pub mod router;
pub mod speech;
pub mod summarize;

use rose_core::message::{Message, Role};
use rose_core::provider::{CompletionRequest, ImageGenerator, TextGenerator};
use rose_core::state::{ConversationState, StateUpdate, WorkflowType};
use rose_memory::MemoryManager;
use rose_providers::ProviderSet;
use std::sync::Arc;

use crate::schedule::Schedule;
use crate::settings::WorkflowSettings;
use crate::speech::SpeechService;

/// The collaborators every node draws from, injected once at startup.
#[derive(Clone)]
pub struct NodeContext {
    pub(crate) llm: Arc<dyn TextGenerator>,
    pub(crate) image: Arc<dyn ImageGenerator>,
    pub(crate) speech: SpeechService,
    pub(crate) memory: Option<Arc<MemoryManager>>,
    pub(crate) schedule: Schedule,
    pub(crate) settings: WorkflowSettings,
}

impl NodeContext {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        image: Arc<dyn ImageGenerator>,
        speech: SpeechService,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            llm,
            image,
            speech,
            memory: None,
            schedule: Schedule::rose(),
            settings,
        }
    }

    /// Wire the guarded providers of a [`ProviderSet`].
    pub fn from_providers(providers: &ProviderSet, settings: WorkflowSettings) -> Self {
        let speech = SpeechService::new(
            providers.stt.clone(),
            providers.tts.clone(),
            settings.tts_timeout,
        );
        Self::new(providers.llm.clone(), providers.image.clone(), speech, settings)
    }

    pub fn with_memory(mut self, memory: Arc<MemoryManager>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn speech(&self) -> &SpeechService {
        &self.speech
    }

    pub fn memory(&self) -> Option<&Arc<MemoryManager>> {
        self.memory.as_ref()
    }
}

/// A step of the per-turn graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    MemoryExtraction,
    Router,
    ContextInjection,
    MemoryInjection,
    Conversation,
    Image,
    Audio,
    /// Synthesis for every assistant reply, whatever the workflow.
    Speech,
    Summarize,
    End,
}

impl Node {
    pub const START: Node = Node::MemoryExtraction;

    pub fn as_str(&self) -> &'static str {
        match self {
            Node::MemoryExtraction => "memory_extraction",
            Node::Router => "router",
            Node::ContextInjection => "context_injection",
            Node::MemoryInjection => "memory_injection",
            Node::Conversation => "conversation",
            Node::Image => "image",
            Node::Audio => "audio",
            Node::Speech => "speech",
            Node::Summarize => "summarize",
            Node::End => "end",
        }
    }

    /// The generation node for a workflow.
    pub fn for_workflow(workflow: WorkflowType) -> Node {
        match workflow {
            WorkflowType::Conversation => Node::Conversation,
            WorkflowType::Image => Node::Image,
            WorkflowType::Audio => Node::Audio,
        }
    }

    /// The edge out of this node.
    pub fn next(self, state: &ConversationState) -> Node {
        match self {
            Node::MemoryExtraction => Node::Router,
            Node::Router => Node::ContextInjection,
            Node::ContextInjection => Node::MemoryInjection,
            Node::MemoryInjection => Node::for_workflow(state.workflow_type.unwrap_or_default()),
            Node::Conversation | Node::Image | Node::Audio => Node::Speech,
            Node::Speech => Node::Summarize,
            Node::Summarize | Node::End => Node::End,
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a node hands back to the orchestrator.
#[derive(Debug, Clone)]
pub struct NodeOutput {
    pub update: StateUpdate,
    /// The node fell back instead of doing its job.
    pub degraded: bool,
}

impl NodeOutput {
    pub fn ok(update: StateUpdate) -> Self {
        Self {
            update,
            degraded: false,
        }
    }

    pub fn degraded(update: StateUpdate) -> Self {
        Self {
            update,
            degraded: true,
        }
    }
}

/// Run one node.
pub async fn execute(node: Node, ctx: &NodeContext, state: &ConversationState) -> NodeOutput {
    match node {
        Node::MemoryExtraction => memory::extract(ctx, state).await,
        Node::Router => router::route(ctx, state).await,
        Node::ContextInjection => context::inject_activity(ctx, state).await,
        Node::MemoryInjection => memory::inject(ctx, state).await,
        Node::Conversation => conversation::generate(ctx, state).await,
        Node::Image => image::generate(ctx, state).await,
        Node::Audio => audio::generate(ctx, state).await,
        Node::Speech => speech::synthesize(ctx, state).await,
        Node::Summarize => summarize::summarize_if_needed(ctx, state).await,
        Node::End => NodeOutput::ok(StateUpdate::Unchanged),
    }
}

/// Transcript form used inside prompts: `user: ...` / `Rose: ...`.
pub(crate) fn format_transcript(messages: &[Message], character_name: &str) -> String {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| match m.role {
            Role::Assistant => format!("{character_name}: {}", m.content),
            _ => format!("user: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A single-prompt request on an optional model.
pub(crate) fn prompt_request(
    prompt: String,
    model: Option<&String>,
    temperature: f32,
) -> CompletionRequest {
    let request = CompletionRequest::new(vec![Message::user(prompt)]).with_temperature(temperature);
    match model {
        Some(model) => request.with_model(model.clone()),
        None => request,
    }
}
