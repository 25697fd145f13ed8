//! Conversation workflow for Rose.
//!
//! Every inbound turn runs through a fixed graph of nodes (see [`nodes`]),
//! driven by the [`Orchestrator`]:
//!
//! ```text
//! memory_extraction → router → context_injection → memory_injection
//!     → conversation | image | audio → speech → summarize → end
//! ```
//!
//! Nodes never fail a turn. Provider errors degrade the node's output, and
//! the orchestrator turns timeouts, storage errors, and panics into a
//! fallback reply.

pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod schedule;
pub mod settings;
pub mod speech;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use graph::{Orchestrator, TurnReply, UserInput};
pub use nodes::{Node, NodeContext, NodeOutput};
pub use schedule::{Schedule, ScheduleSlot};
pub use settings::WorkflowSettings;
pub use speech::SpeechService;
