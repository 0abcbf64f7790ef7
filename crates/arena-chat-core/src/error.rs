//! Unified error type for the chat core.
//!
//! The variants map onto the failure classes the chat flow distinguishes:
//! caller-visible failures (`InvalidArgument`, `Unauthenticated`), failures
//! that are turned into an apology turn (`MalformedResponse`, `Transport`,
//! `HttpStatus`) and storage failures, which are logged at the store
//! boundary and never reach the session.

use thiserror::Error;

/// All errors that can occur while storing or exchanging chat turns.
#[derive(Debug, Error)]
pub enum ChatError {
    /// An argument was rejected before any I/O took place.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No credential is present in the secure store.
    #[error("not authenticated: no credential stored")]
    Unauthenticated,

    /// The endpoint answered successfully but the body is not a fragment sequence.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request never produced a response (connect, TLS, body read, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Schema setup failed while opening the store.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Filesystem error while creating or removing the database file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// `true` for failures that end a turn with the apology message instead
    /// of propagating to the caller.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            ChatError::MalformedResponse(_) | ChatError::Transport(_) | ChatError::HttpStatus(_)
        )
    }

    /// `true` for failures of the embedded database or its file.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            ChatError::Storage(_) | ChatError::Migration(_) | ChatError::Io(_)
        )
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ChatError::HttpStatus(status.as_u16()),
            None if e.is_decode() => ChatError::MalformedResponse(e.to_string()),
            None => ChatError::Transport(e.to_string()),
        }
    }
}
