//! The per-turn orchestrator.
//!
//! Loads the session checkpoint, walks the node graph from
//! [`Node::START`] to [`Node::End`], applies every node's update, and saves
//! the result. A turn always produces a reply: the workflow timeout, storage
//! errors, and panics inside a node all end in [`prompts::FALLBACK_REPLY`].

use futures::FutureExt;
use rose_config::AppConfig;
use rose_core::checkpoint::CheckpointStore;
use rose_core::error::{CheckpointError, Error};
use rose_core::memory::VectorStore;
use rose_core::message::{Attachment, Message, SessionId};
use rose_core::state::{ConversationState, StateUpdate, WorkflowType};
use rose_memory::MemoryManager;
use rose_providers::{ProviderSet, RetryPolicy};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::nodes::{self, Node, NodeContext};
use crate::prompts;
use crate::settings::WorkflowSettings;

/// What the user sent.
#[derive(Debug, Clone)]
pub enum UserInput {
    Text(String),
    /// Raw recorded audio, transcribed before the graph runs.
    Voice(Vec<u8>),
}

/// Everything the caller needs to answer the user.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub text: String,
    /// Synthesized speech for `text`, when synthesis succeeded.
    pub audio: Option<Vec<u8>>,
    pub audio_mime: Option<String>,
    pub image_path: Option<String>,
    pub workflow_type: WorkflowType,
    /// What was heard, for voice input.
    pub transcript: Option<String>,
    /// Nodes that fell back during this turn.
    pub degraded: Vec<Node>,
    /// The graph did not produce `text`: a canned reply stands in.
    pub fallback: bool,
}

impl TurnReply {
    fn canned(text: &str, transcript: Option<String>) -> Self {
        Self {
            text: text.to_string(),
            audio: None,
            audio_mime: None,
            image_path: None,
            workflow_type: WorkflowType::Conversation,
            transcript,
            degraded: Vec::new(),
            fallback: true,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.fallback || !self.degraded.is_empty()
    }
}

/// Result of walking the graph once.
struct GraphRun {
    reply: Option<String>,
    degraded: Vec<Node>,
}

pub struct Orchestrator {
    ctx: NodeContext,
    checkpoints: Arc<dyn CheckpointStore>,
    save_retry: RetryPolicy,
}

impl Orchestrator {
    pub fn new(ctx: NodeContext, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            ctx,
            checkpoints,
            save_retry: RetryPolicy::default(),
        }
    }

    pub fn with_save_retry(mut self, policy: RetryPolicy) -> Self {
        self.save_retry = policy;
        self
    }

    /// Wire an orchestrator from configuration and already-guarded providers.
    ///
    /// Long-term memory is enabled when a vector store is given.
    pub fn from_config(
        config: &AppConfig,
        providers: &ProviderSet,
        memory_store: Option<Arc<dyn VectorStore>>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        let settings = WorkflowSettings::from_config(config);
        let mut ctx = NodeContext::from_providers(providers, settings);
        if let Some(store) = memory_store {
            let manager = MemoryManager::new(providers.llm.clone(), store)
                .with_model(config.models.small_text_model.clone())
                .with_duplicate_threshold(config.workflow.memory_duplicate_threshold)
                .with_top_k(config.workflow.memory_top_k);
            ctx = ctx.with_memory(Arc::new(manager));
        }
        Self::new(ctx, checkpoints).with_save_retry(RetryPolicy::from_config(&config.resilience))
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    /// Run one turn. Never fails: every error path ends in a reply.
    pub async fn run_turn(&self, session_id: &SessionId, input: UserInput) -> TurnReply {
        let span = info_span!("turn", session_id = %session_id);
        self.turn(session_id, input).instrument(span).await
    }

    async fn turn(&self, session_id: &SessionId, input: UserInput) -> TurnReply {
        let (text, transcript) = match input {
            UserInput::Text(text) => (text, None),
            UserInput::Voice(audio) => match self.ctx.speech.transcribe(&audio).await {
                Some(text) => (text.clone(), Some(text)),
                None => return TurnReply::canned(prompts::COULD_NOT_HEAR, None),
            },
        };
        if text.trim().is_empty() {
            return TurnReply::canned(prompts::COULD_NOT_HEAR, transcript);
        }
        let user = Message::user(text.trim());

        let pipeline = AssertUnwindSafe(self.process(session_id, user.clone(), transcript.clone()))
            .catch_unwind();
        match tokio::time::timeout(self.ctx.settings.workflow_timeout, pipeline).await {
            Ok(Ok(Ok(reply))) => reply,
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "Turn failed, replying with fallback");
                self.recover(session_id, user, transcript).await
            }
            Ok(Err(_)) => {
                error!("Turn panicked, replying with fallback");
                self.recover(session_id, user, transcript).await
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.ctx.settings.workflow_timeout.as_secs(),
                    "Turn timed out, replying with fallback"
                );
                self.recover(session_id, user, transcript).await
            }
        }
    }

    async fn process(
        &self,
        session_id: &SessionId,
        user: Message,
        transcript: Option<String>,
    ) -> Result<TurnReply, Error> {
        let mut state = self.checkpoints.load(session_id).await?.unwrap_or_default();
        state.begin_turn();
        state.push_user(user);

        let run = self.run_graph(&mut state).await;
        state.touch();

        let audio_mime = state.last_assistant_message().and_then(|m| {
            m.attachments.iter().find_map(|a| match a {
                Attachment::Audio { mime, .. } => Some(mime.clone()),
                _ => None,
            })
        });
        let reply = TurnReply {
            text: run
                .reply
                .unwrap_or_else(|| prompts::FALLBACK_REPLY.to_string()),
            audio: state.audio_buffer.take(),
            audio_mime,
            image_path: state.image_path.clone(),
            workflow_type: state.workflow_type.unwrap_or_default(),
            transcript,
            degraded: run.degraded,
            fallback: false,
        };

        self.save(session_id, &state).await?;
        info!(
            workflow = %reply.workflow_type,
            messages = state.messages().len(),
            degraded = reply.degraded.len(),
            has_audio = reply.audio.is_some(),
            "Turn complete"
        );
        Ok(reply)
    }

    async fn run_graph(&self, state: &mut ConversationState) -> GraphRun {
        let mut run = GraphRun {
            reply: None,
            degraded: Vec::new(),
        };
        let mut node = Node::START;
        while node != Node::End {
            let output = nodes::execute(node, &self.ctx, state).await;
            debug!(node = %node, degraded = output.degraded, "Node finished");
            if output.degraded {
                run.degraded.push(node);
            }
            if let StateUpdate::AssistantReplied { message, .. } = &output.update {
                run.reply = Some(message.content.clone());
            }
            state.apply(output.update);
            node = node.next(state);
        }
        run
    }

    async fn save(&self, session_id: &SessionId, state: &ConversationState) -> Result<(), Error> {
        self.save_retry
            .retry(
                |e: &CheckpointError| matches!(e, CheckpointError::Storage(_)),
                || self.checkpoints.save(session_id, state),
            )
            .await?;
        Ok(())
    }

    /// Persist the user turn with the fallback reply so history stays whole.
    ///
    /// Bounded by `recovery_timeout`: a store that stalled the turn must not
    /// stall the fallback too.
    async fn recover(
        &self,
        session_id: &SessionId,
        user: Message,
        transcript: Option<String>,
    ) -> TurnReply {
        let deadline = self.ctx.settings.recovery_timeout;
        if tokio::time::timeout(deadline, self.record_fallback(session_id, user))
            .await
            .is_err()
        {
            error!(
                timeout_secs = deadline.as_secs(),
                "Checkpoint store unresponsive, fallback turn not recorded"
            );
        }
        TurnReply::canned(prompts::FALLBACK_REPLY, transcript)
    }

    /// Nothing is written when the previous checkpoint can't be read, or when
    /// the turn already reached the store before the failure.
    async fn record_fallback(&self, session_id: &SessionId, user: Message) {
        let mut state = match self.checkpoints.load(session_id).await {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                error!(error = %e, "Could not load session to record the fallback turn");
                return;
            }
        };
        if state.messages().iter().any(|m| m.id == user.id) {
            debug!("Turn was saved before the failure");
            return;
        }
        state.begin_turn();
        state.push_user(user);
        state.apply(StateUpdate::AssistantReplied {
            message: Message::assistant(prompts::FALLBACK_REPLY),
            image_path: None,
        });
        state.touch();
        if let Err(e) = self.save(session_id, &state).await {
            error!(error = %e, "Could not save the fallback turn");
        }
    }

    /// The saved state of a session, if it exists.
    pub async fn session(&self, session_id: &SessionId) -> Result<Option<ConversationState>, Error> {
        Ok(self.checkpoints.load(session_id).await?)
    }

    /// Forget a session. Returns whether there was one.
    pub async fn end_session(&self, session_id: &SessionId) -> Result<bool, Error> {
        let existed = self.checkpoints.delete(session_id).await?;
        info!(session_id = %session_id, existed, "Session ended");
        Ok(existed)
    }
}
