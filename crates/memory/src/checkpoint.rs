//! In-memory checkpoint store: for tests and sessions that need no persistence.

use async_trait::async_trait;
use rose_core::checkpoint::CheckpointStore;
use rose_core::error::CheckpointError;
use rose_core::message::SessionId;
use rose_core::state::ConversationState;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Keeps each session's latest state in a map.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    sessions: RwLock<HashMap<String, ConversationState>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ConversationState>, CheckpointError> {
        Ok(self.sessions.read().await.get(session_id.as_str()).cloned())
    }

    async fn save(
        &self,
        session_id: &SessionId,
        state: &ConversationState,
    ) -> Result<(), CheckpointError> {
        self.sessions
            .write()
            .await
            .insert(session_id.as_str().to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<bool, CheckpointError> {
        Ok(self.sessions.write().await.remove(session_id.as_str()).is_some())
    }
}
