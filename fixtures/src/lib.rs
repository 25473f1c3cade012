//! Test collaborators for the skygate integration suites.
//!
//! `MockOAuthClient` stands in for a real protocol client: it restores
//! sessions from the same storage backend the library writes through, and
//! its next failure can be scripted per operation. `RecordingStorage`
//! wraps the in-memory backend with operation counters and a switchable
//! delete failure, for exercising cleanup paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use skygate::{
    session_key, AuthorizeOptions, CallbackOutcome, CallbackParams, MemoryStorage, OAuthClient,
    OAuthClientError, OAuthSession, Storage, StorageError,
};

/// Scriptable OAuth protocol client backed by a shared storage instance.
pub struct MockOAuthClient {
    pub authorize_endpoint: String,
    session: OAuthSession,
    storage: Arc<dyn Storage>,
    authorize_error: Mutex<Option<OAuthClientError>>,
    callback_error: Mutex<Option<OAuthClientError>>,
    restore_error: Mutex<Option<OAuthClientError>>,
}

impl MockOAuthClient {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            authorize_endpoint: "https://auth.example.com/oauth/authorize".to_string(),
            session: OAuthSession {
                did: "did:plc:test".to_string(),
                handle: Some("alice.bsky.social".to_string()),
                pds_url: Some("https://pds.example.com".to_string()),
                access_token: "access-token".to_string(),
                refresh_token: Some("refresh-token".to_string()),
                expires_at: None,
            },
            storage,
            authorize_error: Mutex::new(None),
            callback_error: Mutex::new(None),
            restore_error: Mutex::new(None),
        }
    }

    /// Replace the session every successful callback returns.
    pub fn with_session(mut self, session: OAuthSession) -> Self {
        self.session = session;
        self
    }

    /// Arrange for the next `authorize` call to fail with `error`.
    pub fn fail_next_authorize(&self, error: OAuthClientError) {
        *self.authorize_error.lock().expect("authorize_error lock") = Some(error);
    }

    /// Arrange for the next `callback` call to fail with `error`.
    pub fn fail_next_callback(&self, error: OAuthClientError) {
        *self.callback_error.lock().expect("callback_error lock") = Some(error);
    }

    /// Arrange for the next `restore` call to fail with `error`.
    pub fn fail_next_restore(&self, error: OAuthClientError) {
        *self.restore_error.lock().expect("restore_error lock") = Some(error);
    }
}

#[async_trait]
impl OAuthClient for MockOAuthClient {
    async fn authorize(
        &self,
        input: &str,
        options: AuthorizeOptions,
    ) -> Result<String, OAuthClientError> {
        if let Some(error) = self.authorize_error.lock().expect("authorize_error lock").take() {
            return Err(error);
        }
        Ok(format!(
            "{}?client_id=test-client&login_hint={}&state={}",
            self.authorize_endpoint,
            urlencoding::encode(input),
            urlencoding::encode(&options.state),
        ))
    }

    async fn callback(&self, params: CallbackParams) -> Result<CallbackOutcome, OAuthClientError> {
        if let Some(error) = self.callback_error.lock().expect("callback_error lock").take() {
            return Err(error);
        }
        Ok(CallbackOutcome {
            session: self.session.clone(),
            state: Some(params.state),
        })
    }

    async fn restore(&self, did: &str) -> Result<Option<OAuthSession>, OAuthClientError> {
        if let Some(error) = self.restore_error.lock().expect("restore_error lock").take() {
            return Err(error);
        }
        let Some(value) = self
            .storage
            .get(&session_key(did))
            .await
            .map_err(|err| OAuthClientError::Network(err.to_string()))?
        else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| OAuthClientError::CorruptSession(err.to_string()))
    }
}

/// Storage wrapper that counts operations and can be told to fail deletes.
#[derive(Default)]
pub struct RecordingStorage {
    inner: MemoryStorage,
    gets: AtomicUsize,
    sets: AtomicUsize,
    deletes: AtomicUsize,
    fail_deletes: AtomicBool,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::new("synthetic delete failure"));
        }
        self.inner.delete(key).await
    }
}
