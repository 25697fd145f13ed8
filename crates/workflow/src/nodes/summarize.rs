//! Summarization node: keeps `messages` bounded.
//!
//! Once the history reaches the trigger, everything but the last
//! `messages_after_summary` turns is folded into the running summary. A
//! failed or empty summary leaves history untouched; the trigger simply
//! fires again next turn.

use rose_core::state::{ConversationState, StateUpdate};
use tracing::{info, warn};

use super::{NodeContext, NodeOutput, format_transcript, prompt_request};
use crate::prompts;

fn summary_prompt(ctx: &NodeContext, state: &ConversationState, fold: usize) -> String {
    let name = &ctx.settings.character_name;
    let conversation = format_transcript(&state.messages()[..fold], name);
    match state.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(existing) => prompts::EXTEND_SUMMARY_PROMPT
            .replace("{name}", name)
            .replace("{summary}", existing)
            .replace("{conversation}", &conversation),
        None => prompts::SUMMARY_PROMPT
            .replace("{name}", name)
            .replace("{conversation}", &conversation),
    }
}

pub async fn summarize_if_needed(ctx: &NodeContext, state: &ConversationState) -> NodeOutput {
    let settings = &ctx.settings;
    let total = state.messages().len();
    if total < settings.summary_trigger {
        return NodeOutput::ok(StateUpdate::Unchanged);
    }

    let retained = settings.messages_after_summary.min(total);
    let fold = total - retained;
    if fold == 0 {
        return NodeOutput::ok(StateUpdate::Unchanged);
    }

    let request = prompt_request(
        summary_prompt(ctx, state, fold),
        settings.small_text_model.as_ref(),
        settings.temperature,
    );
    match ctx.llm.complete(request).await {
        Ok(summary) if !summary.trim().is_empty() => {
            info!(folded = fold, retained, "Conversation summarized");
            NodeOutput::ok(StateUpdate::Summarized {
                summary: summary.trim().to_string(),
                retained,
            })
        }
        Ok(_) => {
            warn!("Summary came back empty, keeping full history");
            NodeOutput::degraded(StateUpdate::Unchanged)
        }
        Err(e) => {
            warn!(error = %e, "Summarization failed, keeping full history");
            NodeOutput::degraded(StateUpdate::Unchanged)
        }
    }
}
