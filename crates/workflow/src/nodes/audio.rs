//! Audio node: a reply written to be heard.
//!
//! Same prompt as the conversation node plus a spoken-delivery directive.
//! Synthesis itself happens in the speech step that follows every reply.

use rose_core::state::ConversationState;

use super::conversation;
use super::{NodeContext, NodeOutput};
use crate::prompts;

pub async fn generate(ctx: &NodeContext, state: &ConversationState) -> NodeOutput {
    conversation::reply(ctx, state, Some(prompts::AUDIO_DELIVERY_DIRECTIVE)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockImage, MockLlm, MockSpeech, PromptKind, context};
    use rose_core::message::Message;
    use rose_core::state::StateUpdate;
    use std::sync::Arc;

    #[tokio::test]
    async fn adds_delivery_directive() {
        let llm = Arc::new(MockLlm::new().replying("Here's a little song for you."));
        let ctx = context(
            llm.clone(),
            Arc::new(MockImage::png()),
            Arc::new(MockSpeech::working()),
            std::env::temp_dir(),
        );
        let mut state = ConversationState::new();
        state.push_user(Message::user("sing me something"));

        let out = generate(&ctx, &state).await;
        assert!(matches!(
            out.update,
            StateUpdate::AssistantReplied { ref message, .. } if message.content == "Here's a little song for you."
        ));
        let request = llm.last_request(PromptKind::Reply).unwrap();
        assert!(request.messages[0].content.contains("read aloud"));
    }
}
