//! Persistence wrapper around the protocol client's session restoration.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::client::{OAuthClient, OAuthClientError, OAuthSession};
use crate::storage::{Storage, StorageError};

/// Storage key for a subject's persisted OAuth session.
pub fn session_key(did: &str) -> String {
    format!("session:{did}")
}

/// Wraps session restoration with the recovery policy: transient failures
/// propagate unchanged so callers can retry or surface a 5xx, terminal
/// failures evict the stored record and resolve to "no session". Handlers
/// downstream only ever see the session-or-null contract.
#[derive(Clone)]
pub struct SessionStore {
    client: Arc<dyn OAuthClient>,
    storage: Arc<dyn Storage>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(client: Arc<dyn OAuthClient>, storage: Arc<dyn Storage>, ttl: Duration) -> Self {
        Self {
            client,
            storage,
            ttl,
        }
    }

    /// Restore the live session for `did`. The protocol client refreshes
    /// tokens internally when needed; refreshed tokens live in the session
    /// object it returns and are only written back through
    /// [`save`](Self::save).
    pub async fn restore(&self, did: &str) -> Result<Option<OAuthSession>, OAuthClientError> {
        match self.client.restore(did).await {
            Ok(session) => Ok(session),
            Err(err) if err.is_transient() => Err(err),
            Err(err) => {
                warn!("Session for {} is unrecoverable, evicting: {}", did, err);
                if let Err(delete_err) = self.storage.delete(&session_key(did)).await {
                    // Cleanup is best effort; the null result still stands.
                    error!(
                        "Failed to delete stored session for {}: {}",
                        did, delete_err
                    );
                }
                Ok(None)
            }
        }
    }

    /// Persist `session` under its subject key with the configured TTL.
    pub async fn save(&self, session: &OAuthSession) -> Result<(), StorageError> {
        let value = serde_json::to_value(session)
            .map_err(|err| StorageError::new(format!("failed to serialize session: {err}")))?;
        self.storage
            .set(&session_key(&session.did), value, Some(self.ttl))
            .await
    }

    /// Remove the stored record for `did`.
    pub async fn delete(&self, did: &str) -> Result<(), StorageError> {
        self.storage.delete(&session_key(did)).await
    }
}
