//! One conversation: the in-memory transcript plus the turn flow that feeds it.
//!
//! A turn runs `Idle → AwaitingAuth → AwaitingResponse → Completed` (or
//! `FallbackCompleted`). Without a credential it drops straight back to
//! `Idle` and nothing is recorded. Every other failure becomes a single
//! apology turn from the model, so a send always produces a visible answer.
//!
//! Turns are not serialised against each other: two overlapping calls to
//! [`ChatSession::send_turn`] interleave their transcript and store writes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::auth::AuthGate;
use crate::client::InferenceClient;
use crate::entities::{ChatStore, ChatTurn, Sender, TranscriptStore};
use crate::error::ChatError;
use crate::stream;

/// Model turn shown whenever a turn cannot complete normally.
pub const APOLOGY_TEXT: &str = "抱歉，发生了错误。";

/// One line of the visible conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// `"user"` or `"model"`.
    pub sender: String,
    pub text: String,
}

impl TranscriptEntry {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender: sender.as_str().to_owned(),
            text: text.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User.as_str()
    }
}

impl From<ChatTurn> for TranscriptEntry {
    fn from(turn: ChatTurn) -> Self {
        Self {
            sender: turn.sender,
            text: turn.message,
        }
    }
}

/// Where the most recent turn stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingAuth,
    AwaitingResponse,
    Completed,
    FallbackCompleted,
}

/// How a finished turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered; both turns are recorded.
    Completed,
    /// The exchange failed; the apology turn is recorded.
    FallbackCompleted,
    /// The model answered with an empty message; only the optimistic user
    /// entry is on screen and nothing was persisted.
    NothingToPersist,
}

/// Conversation state shared with the presentation layer.
#[derive(Debug)]
pub struct ChatSession<C, S = TranscriptStore> {
    client: C,
    store: Arc<S>,
    auth: AuthGate,
    transcript: Mutex<Vec<TranscriptEntry>>,
    phase: Mutex<TurnPhase>,
    in_flight: AtomicUsize,
}

impl<C, S> ChatSession<C, S>
where
    C: InferenceClient,
    S: ChatStore,
{
    /// Create a session whose transcript starts from the persisted history.
    pub async fn start(client: C, store: Arc<S>, auth: AuthGate) -> Self {
        let history: Vec<TranscriptEntry> = store
            .load_all()
            .await
            .into_iter()
            .map(TranscriptEntry::from)
            .collect();
        info!(turns = history.len(), "chat session started");

        Self {
            client,
            store,
            auth,
            transcript: Mutex::new(history),
            phase: Mutex::new(TurnPhase::Idle),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Snapshot of the visible conversation, oldest first.
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.lock_transcript().clone()
    }

    pub fn phase(&self) -> TurnPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `true` while a turn is waiting on the network.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one turn for `query`.
    ///
    /// Only [`ChatError::Unauthenticated`] is returned as an error; in that
    /// case no request is made and nothing is recorded. Any string is sent
    /// as-is, including an empty one.
    pub async fn send_turn(&self, query: &str) -> Result<TurnOutcome, ChatError> {
        self.set_phase(TurnPhase::AwaitingAuth);
        let credential = match self.auth.require() {
            Ok(credential) => credential,
            Err(e) => {
                self.set_phase(TurnPhase::Idle);
                info!("turn aborted: not signed in");
                return Err(e);
            }
        };

        self.push(TranscriptEntry::new(Sender::User, query));

        let outcome = {
            let _loading = LoadingGuard::enter(&self.in_flight);
            self.set_phase(TurnPhase::AwaitingResponse);
            match self.client.talk(query, &credential).await {
                Ok(body) => stream::decode(body),
                Err(e) => Err(e),
            }
        };

        match outcome {
            Ok(message) if message.is_empty() => {
                debug!("model returned an empty message; nothing to persist");
                self.set_phase(TurnPhase::Completed);
                Ok(TurnOutcome::NothingToPersist)
            }
            Ok(message) => {
                self.push(TranscriptEntry::new(Sender::Model, message.as_str()));
                self.persist(Sender::User, query).await;
                self.persist(Sender::Model, &message).await;
                info!(reply_len = message.len(), "turn completed");
                self.set_phase(TurnPhase::Completed);
                Ok(TurnOutcome::Completed)
            }
            Err(e) => {
                warn!(error = %e, "turn failed; answering with apology");
                self.push(TranscriptEntry::new(Sender::Model, APOLOGY_TEXT));
                self.persist(Sender::User, query).await;
                self.persist(Sender::Model, APOLOGY_TEXT).await;
                self.set_phase(TurnPhase::FallbackCompleted);
                Ok(TurnOutcome::FallbackCompleted)
            }
        }
    }

    /// Erase the persisted history and the visible transcript.
    pub async fn clear_history(&self) {
        self.store.clear().await;
        self.lock_transcript().clear();
    }

    // ── private helpers ──────────────────────────────────────────────────────

    async fn persist(&self, sender: Sender, message: &str) {
        // Storage failures are already logged by the store.
        if let Err(e) = self.store.append(sender.as_str(), message).await {
            warn!(%sender, error = %e, "turn not persisted");
        }
    }

    fn push(&self, entry: TranscriptEntry) {
        self.lock_transcript().push(entry);
    }

    fn set_phase(&self, phase: TurnPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn lock_transcript(&self) -> std::sync::MutexGuard<'_, Vec<TranscriptEntry>> {
        self.transcript.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Counts a turn as loading until dropped, including when the turn's future
/// is dropped mid-request.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, MemorySecretStore};
    use serde_json::{Value, json};
    use tracing_test::traced_test;

    /// Answers every query with the same body and records what it saw.
    struct FixedClient {
        body: Value,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl InferenceClient for FixedClient {
        async fn talk(&self, input: &str, credential: &Credential) -> Result<Value, ChatError> {
            self.seen
                .lock()
                .unwrap()
                .push((input.to_owned(), credential.token().to_owned()));
            Ok(self.body.clone())
        }
    }

    /// Store whose database is always unavailable.
    struct DownStore;

    impl ChatStore for DownStore {
        async fn insert_turn(&self, _sender: &str, _message: &str) -> Result<i64, ChatError> {
            Err(ChatError::Storage(sqlx::Error::PoolClosed))
        }
        async fn select_turns(&self) -> Result<Vec<ChatTurn>, ChatError> {
            Err(ChatError::Storage(sqlx::Error::PoolClosed))
        }
        async fn delete_turns(&self) -> Result<u64, ChatError> {
            Err(ChatError::Storage(sqlx::Error::PoolClosed))
        }
    }

    fn signed_in_gate() -> AuthGate {
        let gate = AuthGate::new(Arc::new(MemorySecretStore::new()), "userToken");
        gate.sign_in("tok").unwrap();
        gate
    }

    #[tokio::test]
    #[traced_test]
    async fn storage_outage_does_not_break_the_turn() {
        let client = FixedClient {
            body: json!([{"data": "still here"}, {"data": "END"}]),
            seen: Mutex::new(Vec::new()),
        };
        let session = ChatSession::start(client, Arc::new(DownStore), signed_in_gate()).await;
        assert!(session.transcript().is_empty());

        let outcome = session.send_turn("hello").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(
            session.transcript(),
            vec![
                TranscriptEntry::new(Sender::User, "hello"),
                TranscriptEntry::new(Sender::Model, "still here"),
            ]
        );
        assert!(logs_contain("failed to save message"));
        assert!(logs_contain("failed to fetch chat history"));
    }

    #[tokio::test]
    async fn empty_query_is_sent_but_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TranscriptStore::new(dir.path().join("ChatHistory.db")));
        let client = FixedClient {
            body: json!([{"data": "you said nothing"}, {"data": "END"}]),
            seen: Mutex::new(Vec::new()),
        };
        let session = ChatSession::start(client, Arc::clone(&store), signed_in_gate()).await;

        assert_eq!(session.send_turn("").await.unwrap(), TurnOutcome::Completed);
        assert_eq!(session.client.seen.lock().unwrap()[0], (String::new(), "tok".to_owned()));

        // The empty user row is rejected by the store; the reply is kept.
        let rows = store.load_all().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sender, "model");
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn phase_and_loading_track_the_turn() {
        let client = FixedClient {
            body: json!([{"data": "END"}]),
            seen: Mutex::new(Vec::new()),
        };
        let session = ChatSession::start(client, Arc::new(DownStore), signed_in_gate()).await;
        assert_eq!(session.phase(), TurnPhase::Idle);

        let outcome = session.send_turn("ping").await.unwrap();
        assert_eq!(outcome, TurnOutcome::NothingToPersist);
        assert_eq!(session.phase(), TurnPhase::Completed);
        assert!(!session.is_loading());

        session.auth().sign_out().unwrap();
        assert!(matches!(
            session.send_turn("ping").await,
            Err(ChatError::Unauthenticated)
        ));
        assert_eq!(session.phase(), TurnPhase::Idle);
    }
}
