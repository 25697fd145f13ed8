//! Context injection node: what Rose is doing right now.

use chrono::{Local, NaiveDateTime};
use rose_core::state::{ConversationState, StateUpdate};
use tracing::debug;

use super::{NodeContext, NodeOutput};

pub async fn inject_activity(ctx: &NodeContext, _state: &ConversationState) -> NodeOutput {
    NodeOutput::ok(StateUpdate::ActivityInjected(activity_at(
        ctx,
        Local::now().naive_local(),
    )))
}

pub(crate) fn activity_at(ctx: &NodeContext, now: NaiveDateTime) -> Option<String> {
    if !ctx.settings.schedule_context {
        return None;
    }
    let activity = ctx.schedule.activity_at(now).map(str::to_string);
    debug!(activity = ?activity, "Current activity");
    activity
}
