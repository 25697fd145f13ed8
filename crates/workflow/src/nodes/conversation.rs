//! Conversation node: Rose's regular reply.

use rose_core::message::Message;
use rose_core::provider::CompletionRequest;
use rose_core::state::{ConversationState, StateUpdate};
use rose_memory::MemoryManager;
use tracing::warn;

use super::{NodeContext, NodeOutput};
use crate::prompts;

/// The system prompt: character card with memories, activity, and summary.
pub(crate) fn character_prompt(ctx: &NodeContext, state: &ConversationState) -> String {
    let memories = MemoryManager::format_for_prompt(&state.memory_context);
    prompts::CHARACTER_CARD_PROMPT
        .replace("{name}", &ctx.settings.character_name)
        .replace(
            "{memory_context}",
            &prompts::or_placeholder(&memories, "Nothing relevant yet."),
        )
        .replace(
            "{current_activity}",
            &prompts::or_placeholder(state.current_activity.as_deref().unwrap_or_default(), "Nothing in particular."),
        )
        .replace(
            "{summary}",
            &prompts::or_placeholder(state.summary.as_deref().unwrap_or_default(), "This is the start of the conversation."),
        )
}

/// Character prompt plus history, with an optional extra directive.
pub(crate) fn reply_request(
    ctx: &NodeContext,
    state: &ConversationState,
    directive: Option<&str>,
) -> CompletionRequest {
    let mut system = character_prompt(ctx, state);
    if let Some(directive) = directive {
        system.push_str("\n\n");
        system.push_str(directive);
    }

    let mut messages = Vec::with_capacity(state.messages().len() + 1);
    messages.push(Message::system(system));
    messages.extend(state.messages().iter().cloned());

    let request = CompletionRequest::new(messages).with_temperature(ctx.settings.temperature);
    match &ctx.settings.text_model {
        Some(model) => request.with_model(model.clone()),
        None => request,
    }
}

/// Generate one assistant reply, falling back to an apology on failure.
pub(crate) async fn reply(
    ctx: &NodeContext,
    state: &ConversationState,
    directive: Option<&str>,
) -> NodeOutput {
    match ctx.llm.complete(reply_request(ctx, state, directive)).await {
        Ok(text) if !text.trim().is_empty() => NodeOutput::ok(StateUpdate::AssistantReplied {
            message: Message::assistant(text.trim()),
            image_path: None,
        }),
        Ok(_) => {
            warn!("Model returned an empty reply, using fallback");
            fallback()
        }
        Err(e) => {
            warn!(error = %e, "Reply generation failed, using fallback");
            fallback()
        }
    }
}

pub(crate) fn fallback() -> NodeOutput {
    NodeOutput::degraded(StateUpdate::AssistantReplied {
        message: Message::assistant(prompts::FALLBACK_REPLY),
        image_path: None,
    })
}

pub async fn generate(ctx: &NodeContext, state: &ConversationState) -> NodeOutput {
    reply(ctx, state, None).await
}
