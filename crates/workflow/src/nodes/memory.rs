//! Memory nodes: extraction (write path) and injection (read path).

use rose_core::state::{ConversationState, StateUpdate};
use tracing::{debug, warn};

use super::{NodeContext, NodeOutput};

/// Store durable facts from the latest user message.
///
/// Never affects the reply; failures are logged and the turn moves on.
pub async fn extract(ctx: &NodeContext, state: &ConversationState) -> NodeOutput {
    let (Some(memory), Some(message)) = (&ctx.memory, state.last_user_message()) else {
        return NodeOutput::ok(StateUpdate::Unchanged);
    };

    match memory.extract_and_store(message).await {
        Ok(Some(stored)) => debug!(memory = %stored, "Memory extracted"),
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "Memory extraction failed, continuing without it");
            return NodeOutput::degraded(StateUpdate::Unchanged);
        }
    }
    NodeOutput::ok(StateUpdate::Unchanged)
}

/// Replace `memory_context` with the memories relevant to this turn.
///
/// Always emits a fresh list, empty when nothing matches or the store is
/// unreachable.
pub async fn inject(ctx: &NodeContext, state: &ConversationState) -> NodeOutput {
    let Some(memory) = &ctx.memory else {
        return NodeOutput::ok(StateUpdate::MemoryInjected(Vec::new()));
    };
    let query = state
        .last_user_message()
        .map(|m| m.content.as_str())
        .unwrap_or_default();

    match memory.relevant_memories(query).await {
        Ok(memories) => {
            debug!(count = memories.len(), "Memories injected");
            NodeOutput::ok(StateUpdate::MemoryInjected(memories))
        }
        Err(e) => {
            warn!(error = %e, "Memory retrieval failed, continuing without memories");
            NodeOutput::degraded(StateUpdate::MemoryInjected(Vec::new()))
        }
    }
}
