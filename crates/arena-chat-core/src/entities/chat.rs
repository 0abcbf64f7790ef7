use std::future::Future;

use tracing::{debug, error, info};

use crate::entities::{ChatTurn, Sender, TranscriptStore};
use crate::error::ChatError;

/// Row-level access to the chat history.
///
/// Implementors provide the raw `*_turn(s)` operations, which report every
/// failure. The provided `append`, `load_all` and `clear` wrap them with the
/// policy the chat flow relies on: arguments are validated up front, and
/// storage failures are logged here and go no further.
pub trait ChatStore: Send + Sync + 'static {
    /// Insert one row in its own transaction and return its id.
    fn insert_turn(
        &self,
        sender: &str,
        message: &str,
    ) -> impl Future<Output = Result<i64, ChatError>> + Send;

    /// All rows in primary-key order.
    fn select_turns(&self) -> impl Future<Output = Result<Vec<ChatTurn>, ChatError>> + Send;

    /// Delete every row and return how many were removed.
    fn delete_turns(&self) -> impl Future<Output = Result<u64, ChatError>> + Send;

    /// Persist a turn.
    ///
    /// Returns `Err(InvalidArgument)` when either field is empty or `sender`
    /// is not `"user"` or `"model"`. A storage failure is logged and yields
    /// `Ok(None)`; `Ok(Some(id))` means the row is committed.
    fn append(
        &self,
        sender: &str,
        message: &str,
    ) -> impl Future<Output = Result<Option<i64>, ChatError>> + Send {
        async move {
            if sender.is_empty() || message.is_empty() {
                return Err(ChatError::InvalidArgument(
                    "sender and message are both required".into(),
                ));
            }
            sender.parse::<Sender>()?;
            match self.insert_turn(sender, message).await {
                Ok(id) => {
                    debug!(id, sender, "message saved");
                    Ok(Some(id))
                }
                Err(e) => {
                    error!(sender, error = %e, "failed to save message");
                    Ok(None)
                }
            }
        }
    }

    /// Every persisted turn, or an empty list if the store cannot be read.
    fn load_all(&self) -> impl Future<Output = Vec<ChatTurn>> + Send {
        async move {
            match self.select_turns().await {
                Ok(turns) => {
                    debug!(count = turns.len(), "fetched chat history");
                    turns
                }
                Err(e) => {
                    error!(error = %e, "failed to fetch chat history");
                    Vec::new()
                }
            }
        }
    }

    /// Erase the whole history. Safe to call on an empty store.
    fn clear(&self) -> impl Future<Output = ()> + Send {
        async move {
            match self.delete_turns().await {
                Ok(removed) => info!(removed, "chat history cleared"),
                Err(e) => error!(error = %e, "failed to clear chat history"),
            }
        }
    }
}

impl ChatStore for TranscriptStore {
    async fn insert_turn(&self, sender: &str, message: &str) -> Result<i64, ChatError> {
        let pool = self.open().await?;
        let mut tx = pool.begin().await?;
        let result = sqlx::query("INSERT INTO chat_history (sender, message) VALUES (?1, ?2)")
            .bind(sender)
            .bind(message)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    async fn select_turns(&self) -> Result<Vec<ChatTurn>, ChatError> {
        let pool = self.open().await?;
        let mut tx = pool.begin().await?;
        let rows: Vec<(i64, String, String)> =
            sqlx::query_as("SELECT id, sender, message FROM chat_history ORDER BY id ASC")
                .fetch_all(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(rows
            .into_iter()
            .map(|(id, sender, message)| ChatTurn { id, sender, message })
            .collect())
    }

    async fn delete_turns(&self) -> Result<u64, ChatError> {
        let pool = self.open().await?;
        let mut tx = pool.begin().await?;
        let result = sqlx::query("DELETE FROM chat_history")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    /// Database path whose parent is a regular file, so every open fails.
    fn unreachable_store(dir: &tempfile::TempDir) -> TranscriptStore {
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        TranscriptStore::new(blocker.join("ChatHistory.db"))
    }

    #[tokio::test]
    async fn append_rejects_empty_fields_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().join("ChatHistory.db"));

        assert!(matches!(
            store.append("", "x").await,
            Err(ChatError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.append("user", "").await,
            Err(ChatError::InvalidArgument(_))
        ));
        assert!(!store.is_open().await, "validation must not open the database");
        assert!(store.load_all().await.is_empty());
    }

    #[tokio::test]
    async fn append_rejects_unknown_sender() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().join("ChatHistory.db"));

        for sender in ["admin", "User", "assistant", " model"] {
            assert!(
                matches!(store.append(sender, "x").await, Err(ChatError::InvalidArgument(_))),
                "sender {sender:?} must be rejected"
            );
        }
        assert!(!store.is_open().await, "validation must not open the database");
        assert!(store.load_all().await.is_empty());

        assert!(store.append("model", "x").await.unwrap().is_some());
    }

    #[tokio::test]
    #[traced_test]
    async fn storage_failure_is_logged_and_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = unreachable_store(&dir);

        let saved = store.append("user", "hello").await.expect("storage errors are swallowed");
        assert_eq!(saved, None);
        assert!(store.load_all().await.is_empty());
        store.clear().await;

        assert!(logs_contain("failed to save message"));
        assert!(logs_contain("failed to fetch chat history"));
        assert!(logs_contain("failed to clear chat history"));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().join("ChatHistory.db"));

        store.clear().await;
        store.append("user", "hi").await.unwrap();
        store.clear().await;
        store.clear().await;
        assert!(store.load_all().await.is_empty());
        assert_eq!(store.delete_turns().await.unwrap(), 0);
    }
}
