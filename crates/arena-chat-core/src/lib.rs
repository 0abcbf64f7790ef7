//! arena-chat-core – local chat transcripts and the AI chat turn flow.
//!
//! - [`entities`]: SQLite-backed [`TranscriptStore`] and the [`ChatStore`] trait.
//! - [`stream`]: reduces the endpoint's fragment array to one message.
//! - [`auth`]: the secure-store capability and the [`AuthGate`].
//! - [`client`]: the [`InferenceClient`] seam and its `reqwest` implementation.
//! - [`session`]: [`ChatSession`], which ties the above together per turn.

pub mod auth;
pub mod client;
pub mod config;
pub mod entities;
pub mod error;
pub mod session;
pub mod stream;

pub use auth::{AuthGate, Credential, MemorySecretStore, SecretStore, SecretStoreError};
pub use client::{HttpInferenceClient, InferenceClient};
pub use config::ChatConfig;
pub use entities::{ChatStore, ChatTurn, Sender, TranscriptStore};
pub use error::ChatError;
pub use session::{APOLOGY_TEXT, ChatSession, TranscriptEntry, TurnOutcome, TurnPhase};
pub use stream::{END_SENTINEL, StreamFragment};
