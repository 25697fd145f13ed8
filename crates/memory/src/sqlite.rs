//! SQLite checkpoint store.
//!
//! One row per session in a `checkpoints` table; the conversation state is
//! stored as a JSON document. Per-turn fields that are never persisted
//! (audio buffer, memory context) are dropped by the state's serde attributes.

use async_trait::async_trait;
use chrono::Utc;
use rose_core::checkpoint::CheckpointStore;
use rose_core::error::CheckpointError;
use rose_core::message::SessionId;
use rose_core::state::ConversationState;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed [`CheckpointStore`].
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (creating if missing) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, CheckpointError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| CheckpointError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // A single connection keeps `sqlite::memory:` databases coherent.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| CheckpointError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite checkpoint store initialized at {path}");
        Ok(store)
    }

    /// Open the database file at `path`, creating parent directories.
    pub async fn open(path: &std::path::Path) -> Result<Self, CheckpointError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CheckpointError::Storage(format!("Failed to create checkpoint directory: {e}"))
            })?;
        }
        Self::new(&format!("sqlite://{}", path.display())).await
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, CheckpointError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), CheckpointError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                session_id    TEXT PRIMARY KEY NOT NULL,
                state         TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0,
                updated_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::MigrationFailed(format!("checkpoints table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_checkpoints_updated_at ON checkpoints(updated_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::MigrationFailed(format!("updated_at index: {e}")))?;

        debug!("SQLite checkpoint migrations complete");
        Ok(())
    }

    /// Number of stored sessions.
    pub async fn session_count(&self) -> Result<usize, CheckpointError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM checkpoints")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        let count: i64 = row.get("cnt");
        Ok(count as usize)
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ConversationState>, CheckpointError> {
        let row = sqlx::query("SELECT state FROM checkpoints WHERE session_id = ?1")
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let json: String = row.get("state");
        let state = serde_json::from_str(&json).map_err(|e| CheckpointError::Corrupted {
            session_id: session_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(state))
    }

    async fn save(
        &self,
        session_id: &SessionId,
        state: &ConversationState,
    ) -> Result<(), CheckpointError> {
        let json = serde_json::to_string(state)
            .map_err(|e| CheckpointError::Storage(format!("Failed to serialize state: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO checkpoints (session_id, state, message_count, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_id) DO UPDATE SET
                state = excluded.state,
                message_count = excluded.message_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session_id.as_str())
        .bind(&json)
        .bind(state.messages().len() as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))?;

        debug!(session_id = %session_id, messages = state.messages().len(), "Checkpoint saved");
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<bool, CheckpointError> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE session_id = ?1")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rose_core::message::Message;
    use rose_core::state::{StateUpdate, WorkflowType};

    async fn test_store() -> SqliteCheckpointStore {
        SqliteCheckpointStore::new("sqlite::memory:").await.unwrap()
    }

    fn sample_state() -> ConversationState {
        let mut state = ConversationState::new();
        state.push_user(Message::user("I'm feeling anxious today"));
        state.apply(StateUpdate::WorkflowSelected(WorkflowType::Conversation));
        state.apply(StateUpdate::MemoryInjected(vec!["Works night shifts".into()]));
        state.apply(StateUpdate::AssistantReplied {
            message: Message::assistant("I'm here. Want to talk about it?"),
            image_path: None,
        });
        state.apply(StateUpdate::AudioAttached {
            audio: vec![1, 2, 3],
            mime: "audio/mpeg".into(),
        });
        state.summary = Some("They met last week.".into());
        state
    }

    #[tokio::test]
    async fn load_missing_session() {
        let store = test_store().await;
        assert!(store.load(&SessionId::from("nobody")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let store = test_store().await;
        let id = SessionId::from("alice");
        store.save(&id, &sample_state()).await.unwrap();

        let loaded = store.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.messages().len(), 2);
        assert_eq!(loaded.summary.as_deref(), Some("They met last week."));
        assert_eq!(loaded.workflow_type, Some(WorkflowType::Conversation));
        // Per-turn buffers are never persisted.
        assert!(loaded.audio_buffer.is_none());
        assert!(loaded.memory_context.is_empty());
    }

    #[tokio::test]
    async fn save_overwrites_previous_checkpoint() {
        let store = test_store().await;
        let id = SessionId::from("alice");
        store.save(&id, &ConversationState::new()).await.unwrap();
        store.save(&id, &sample_state()).await.unwrap();

        assert_eq!(store.session_count().await.unwrap(), 1);
        assert_eq!(store.load(&id).await.unwrap().unwrap().messages().len(), 2);
    }

    #[tokio::test]
    async fn delete_session() {
        let store = test_store().await;
        let id = SessionId::from("alice");
        store.save(&id, &sample_state()).await.unwrap();

        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert!(store.load(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupted_row_is_reported() {
        let store = test_store().await;
        sqlx::query(
            "INSERT INTO checkpoints (session_id, state, message_count, updated_at) VALUES ('bad', 'not json', 0, '')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.load(&SessionId::from("bad")).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupted { .. }));
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("checkpoints.db");
        let id = SessionId::from("alice");

        {
            let store = SqliteCheckpointStore::open(&path).await.unwrap();
            store.save(&id, &sample_state()).await.unwrap();
        }

        let reopened = SqliteCheckpointStore::open(&path).await.unwrap();
        assert!(reopened.load(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn store_name() {
        assert_eq!(test_store().await.name(), "sqlite");
    }
}
