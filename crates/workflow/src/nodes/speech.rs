//! Speech step: voice for every assistant reply.
//!
//! Runs after whichever generation node handled the turn, so conversation,
//! image, and audio replies are all synthesized. A failed synthesis leaves
//! the reply text-only.

use rose_core::message::Role;
use rose_core::state::{ConversationState, StateUpdate};

use super::{NodeContext, NodeOutput};

pub async fn synthesize(ctx: &NodeContext, state: &ConversationState) -> NodeOutput {
    let Some(reply) = state.messages().last().filter(|m| m.role == Role::Assistant) else {
        return NodeOutput::ok(StateUpdate::Unchanged);
    };

    match ctx.speech.synthesize_reply(&reply.content).await {
        Some(audio) => NodeOutput::ok(StateUpdate::AudioAttached {
            audio,
            mime: ctx.speech.mime_type().to_string(),
        }),
        None => NodeOutput::degraded(StateUpdate::Unchanged),
    }
}
