//! Credential access for the chat flow.
//!
//! The secure key-value store itself belongs to the platform; this module
//! only defines the capability ([`SecretStore`]) and the gate the session
//! consults before talking to the network.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ChatError;

/// Failure reported by a [`SecretStore`] backend.
#[derive(Debug, Error)]
#[error("secret store error: {0}")]
pub struct SecretStoreError(pub String);

/// Secure get/set/delete key-value capability.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SecretStoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SecretStoreError>;
    fn delete(&self, key: &str) -> Result<(), SecretStoreError>;
}

/// Process-local [`SecretStore`]; nothing is written to disk.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, SecretStoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| SecretStoreError("lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SecretStoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SecretStoreError("lock poisoned".into()))?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), SecretStoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SecretStoreError("lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}

/// A bearer token. `Debug` does not print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Looks up the bearer token under a fixed key.
#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn SecretStore>,
    key: String,
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate").field("key", &self.key).finish_non_exhaustive()
    }
}

impl AuthGate {
    pub fn new(store: Arc<dyn SecretStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Return the stored credential or [`ChatError::Unauthenticated`].
    ///
    /// An empty token, or a store that fails to answer, counts as signed out.
    pub fn require(&self) -> Result<Credential, ChatError> {
        match self.store.get(&self.key) {
            Ok(Some(token)) if !token.is_empty() => Ok(Credential(token)),
            Ok(_) => {
                debug!(key = %self.key, "no credential stored");
                Err(ChatError::Unauthenticated)
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to read credential");
                Err(ChatError::Unauthenticated)
            }
        }
    }

    /// Store a token, as a login flow would.
    pub fn sign_in(&self, token: &str) -> Result<(), SecretStoreError> {
        self.store.set(&self.key, token)
    }

    pub fn sign_out(&self) -> Result<(), SecretStoreError> {
        self.store.delete(&self.key)
    }
}
