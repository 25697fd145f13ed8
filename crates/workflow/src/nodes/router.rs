//! Router node: picks the generation path for the turn.
//!
//! Classification is delegated to the small model. Anything other than a
//! clean `conversation`/`image`/`audio` answer, and any provider failure
//! (exhausted retries, open circuit), routes to `conversation`.

use rose_core::json;
use rose_core::state::{ConversationState, StateUpdate, WorkflowType};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{NodeContext, NodeOutput, format_transcript, prompt_request};
use crate::prompts;

#[derive(Debug, Deserialize)]
struct RouterDecision {
    response_type: String,
}

/// Parse the model's answer: `{"response_type": "..."}` or a bare label.
pub fn parse_route(raw: &str) -> Option<WorkflowType> {
    match json::parse_embedded::<RouterDecision>(raw) {
        Ok(decision) => WorkflowType::parse(&decision.response_type),
        Err(_) => WorkflowType::parse(raw),
    }
}

pub async fn route(ctx: &NodeContext, state: &ConversationState) -> NodeOutput {
    let settings = &ctx.settings;
    let window = state.recent_messages(settings.router_window);
    let prompt = prompts::ROUTER_PROMPT
        .replace("{name}", &settings.character_name)
        .replace("{conversation}", &format_transcript(window, &settings.character_name));
    let request = prompt_request(prompt, settings.small_text_model.as_ref(), 0.0);

    match ctx.llm.complete(request).await {
        Ok(raw) => match parse_route(&raw) {
            Some(workflow) => {
                debug!(workflow = %workflow, "Routed turn");
                NodeOutput::ok(StateUpdate::WorkflowSelected(workflow))
            }
            None => {
                warn!(output = %raw, "Unparseable routing decision, defaulting to conversation");
                NodeOutput::degraded(StateUpdate::WorkflowSelected(WorkflowType::Conversation))
            }
        },
        Err(e) => {
            warn!(error = %e, "Routing failed, defaulting to conversation");
            NodeOutput::degraded(StateUpdate::WorkflowSelected(WorkflowType::Conversation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockImage, MockLlm, MockSpeech, PromptKind, context};
    use rose_core::message::Message;
    use std::sync::Arc;

    fn ctx(llm: MockLlm) -> (NodeContext, Arc<MockLlm>) {
        let llm = Arc::new(llm);
        let ctx = context(
            llm.clone(),
            Arc::new(MockImage::png()),
            Arc::new(MockSpeech::working()),
            std::env::temp_dir(),
        );
        (ctx, llm)
    }

    fn selected(out: &NodeOutput) -> WorkflowType {
        match out.update {
            StateUpdate::WorkflowSelected(w) => w,
            ref other => panic!("unexpected update: {other:?}"),
        }
    }

    fn long_state() -> ConversationState {
        let mut state = ConversationState::new();
        for i in 0..6 {
            state.push_user(Message::user(format!("message {i}")));
        }
        state
    }

    #[test]
    fn parse_variants() {
        assert_eq!(parse_route(r#"{"response_type": "image"}"#), Some(WorkflowType::Image));
        assert_eq!(parse_route("```json\n{\"response_type\":\"Audio\"}\n```"), Some(WorkflowType::Audio));
        assert_eq!(parse_route("conversation"), Some(WorkflowType::Conversation));
        assert_eq!(parse_route(" \"IMAGE\". "), Some(WorkflowType::Image));
        assert_eq!(parse_route(r#"{"response_type": "video"}"#), None);
        assert_eq!(parse_route("I think they want a picture"), None);
    }

    #[tokio::test]
    async fn routes_to_image() {
        let (ctx, _) = ctx(MockLlm::new().routing(r#"{"response_type": "image"}"#));
        let out = route(&ctx, &long_state()).await;
        assert_eq!(selected(&out), WorkflowType::Image);
        assert!(!out.degraded);
    }

    #[tokio::test]
    async fn only_recent_window_is_sent() {
        let (ctx, llm) = ctx(MockLlm::new());
        route(&ctx, &long_state()).await;
        let request = llm.last_request(PromptKind::Router).unwrap();
        let prompt = &request.messages[0].content;
        assert!(prompt.contains("message 5"));
        assert!(prompt.contains("message 3"));
        assert!(!prompt.contains("message 2"));
        assert_eq!(request.temperature, 0.0);
    }

    #[tokio::test]
    async fn malformed_output_defaults_to_conversation() {
        let (ctx, _) = ctx(MockLlm::new().routing("hmm, hard to say"));
        let out = route(&ctx, &long_state()).await;
        assert_eq!(selected(&out), WorkflowType::Conversation);
        assert!(out.degraded);
    }

    #[tokio::test]
    async fn provider_failure_defaults_to_conversation() {
        let (ctx, _) = ctx(MockLlm::new().failing_on(PromptKind::Router));
        let out = route(&ctx, &long_state()).await;
        assert_eq!(selected(&out), WorkflowType::Conversation);
        assert!(out.degraded);
    }
}
