//! Per-session backend client registry.
//!
//! Each MCP session carries its own backend credentials. The registry maps a
//! session ID to the client built for it so the client is constructed once
//! per session rather than once per tool call.
//!
//! ## Lifecycle
//!
//! 1. The transport registers a session ([`SessionRegistry::on_session_registered`]).
//!    Creation is best-effort: without a token no entry is stored.
//! 2. Every tool call goes through [`SessionRegistry::get_or_create`], which
//!    builds the client on demand when registration stored nothing.
//! 3. The transport unregisters the session ([`SessionRegistry::on_session_unregistered`]).
//!
//! Sessions that disconnect without unregistering keep their entry until the
//! process exits.
//!
//! ## Concurrency
//!
//! `get_or_create` does not de-duplicate concurrent construction for the same
//! session: two racing callers may each build a client, the last insert wins
//! and the other client is dropped once its caller is done with it. Clients
//! are cheap wrappers over a connection pool, so this is tolerated.

use crate::credentials::CredentialBundle;
use crate::vault::{ClientError, ClientFactory, VaultClient};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Concurrency-safe map from session ID to backend client.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<VaultClient>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Client stored for a session, if any.
    pub fn get(&self, session_id: &str) -> Option<Arc<VaultClient>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    /// Store a client, replacing any previous one for the session.
    pub fn put(&self, session_id: impl Into<String>, client: Arc<VaultClient>) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.into(), client);
    }

    /// Drop a session's client. Returns whether an entry existed.
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some()
    }

    /// Look up a session's client, building and storing one on a miss.
    ///
    /// The lock is not held while the client is built.
    pub fn get_or_create(
        &self,
        session_id: &str,
        credentials: &CredentialBundle,
        factory: &ClientFactory,
    ) -> Result<Arc<VaultClient>, ClientError> {
        if let Some(client) = self.get(session_id) {
            return Ok(client);
        }

        let client = Arc::new(factory.create(credentials)?);
        self.put(session_id, client.clone());
        tracing::debug!(session_id, address = client.address(), "Created backend client on demand");
        Ok(client)
    }

    /// Session-registration hook. Failures are logged, never propagated.
    pub fn on_session_registered(
        &self,
        session_id: &str,
        credentials: &CredentialBundle,
        factory: &ClientFactory,
    ) -> bool {
        match factory.create(credentials) {
            Ok(client) => {
                tracing::info!(
                    session_id,
                    address = client.address(),
                    namespace = client.namespace().unwrap_or(""),
                    "Registered session"
                );
                self.put(session_id, Arc::new(client));
                true
            }
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Session registered without a backend client");
                false
            }
        }
    }

    /// Session-teardown hook.
    pub fn on_session_unregistered(&self, session_id: &str) {
        if self.remove(session_id) {
            tracing::info!(session_id, "Unregistered session");
        } else {
            tracing::debug!(session_id, "Unregistered unknown session");
        }
    }

    /// Number of sessions holding a client.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
