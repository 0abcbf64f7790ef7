//! Transcript persistence.
//!
//! [`TranscriptStore`] owns the SQLite database that backs the chat history.
//! The connection pool is opened lazily on first use and shared for the life
//! of the store; [`TranscriptStore::destroy`] drops it together with the
//! database file so the next access starts from an empty schema.
//!
//! Row-level operations live on the [`ChatStore`] trait.

pub mod chat;
pub mod dao;

pub use chat::ChatStore;
pub use dao::{ChatTurn, Sender};

use std::io;
use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::ChatError;

/// SQLite-backed chat transcript store.
#[derive(Debug)]
pub struct TranscriptStore {
    path: PathBuf,
    /// `None` until the first [`open`](Self::open), and again after
    /// [`destroy`](Self::destroy).
    pool: Mutex<Option<SqlitePool>>,
}

impl TranscriptStore {
    /// Create a store for the database file at `path`. No I/O happens here.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the shared pool, creating the database and the `chat_history`
    /// table on first call.
    ///
    /// The lock is held across the connect so concurrent first callers wait
    /// for a single pool rather than racing to build their own.
    pub async fn open(&self) -> Result<SqlitePool, ChatError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .inspect_err(|e| error!(path = %self.path.display(), error = %e, "failed to open database"))?;

        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(path = %self.path.display(), "table 'chat_history' ensured");

        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// `true` while a pool is held.
    pub async fn is_open(&self) -> bool {
        self.pool.lock().await.is_some()
    }

    /// Close the pool and delete the database file.
    ///
    /// Failures are logged and swallowed; the handle is reset either way so
    /// a later [`open`](Self::open) starts over.
    pub async fn destroy(&self) {
        match self.try_destroy().await {
            Ok(()) => info!(path = %self.path.display(), "database deleted"),
            Err(e) => error!(path = %self.path.display(), error = %e, "failed to delete database"),
        }
    }

    async fn try_destroy(&self) -> Result<(), ChatError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
        }

        remove_if_exists(&self.path).await?;
        for suffix in ["-wal", "-shm", "-journal"] {
            let mut sidecar = self.path.clone().into_os_string();
            sidecar.push(suffix);
            remove_if_exists(Path::new(&sidecar)).await?;
        }
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed database file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
