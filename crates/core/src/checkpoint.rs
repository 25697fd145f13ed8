//! Checkpoint store trait: persisted session state between turns.

use async_trait::async_trait;

use crate::error::CheckpointError;
use crate::message::SessionId;
use crate::state::ConversationState;

/// The checkpoint-store collaborator.
///
/// Implementations: in-memory (tests, ephemeral sessions), SQLite.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    fn name(&self) -> &str;

    /// The last saved state for a session, if any.
    async fn load(&self, session_id: &SessionId)
    -> Result<Option<ConversationState>, CheckpointError>;

    /// Persist the state after a turn, replacing any previous checkpoint.
    async fn save(
        &self,
        session_id: &SessionId,
        state: &ConversationState,
    ) -> Result<(), CheckpointError>;

    /// Discard a session. Returns whether a checkpoint existed.
    async fn delete(&self, session_id: &SessionId) -> Result<bool, CheckpointError>;
}
