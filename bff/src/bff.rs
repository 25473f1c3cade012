//! Composition root.

use std::sync::Arc;

use crate::client::OAuthClient;
use crate::config::AuthConfig;
use crate::cookies::CookieSessions;
use crate::error::ConfigError;
use crate::metadata::ClientMetadata;
use crate::store::SessionStore;

/// The assembled handler set.
///
/// Validates configuration eagerly, wires the cookie layer and session
/// store around the supplied protocol client, and precomputes the client
/// metadata document. Handlers live in [`crate::routes`] as methods on
/// this type; they are reentrant and hold no per-request state.
pub struct OAuthBff {
    pub(crate) config: AuthConfig,
    pub(crate) metadata: ClientMetadata,
    pub(crate) cookies: CookieSessions,
    pub(crate) store: SessionStore,
    pub(crate) client: Arc<dyn OAuthClient>,
}

impl OAuthBff {
    /// Build the handler set. Fails fast on invalid configuration; nothing
    /// is deferred to the first request.
    pub fn new(mut config: AuthConfig, client: Arc<dyn OAuthClient>) -> Result<Self, ConfigError> {
        config.validate()?;
        let metadata = ClientMetadata::generate(&config)?;
        let cookies = CookieSessions::new(
            &config.cookie_secret,
            config.session_ttl.as_secs(),
            config.wants_secure_cookies(),
        );
        let store = SessionStore::new(client.clone(), config.storage.clone(), config.session_ttl);

        Ok(Self {
            config,
            metadata,
            cookies,
            store,
            client,
        })
    }

    /// The precomputed client metadata document.
    pub fn client_metadata(&self) -> &ClientMetadata {
        &self.metadata
    }

    /// The OAuth `client_id` this deployment registers under.
    pub fn client_id(&self) -> &str {
        &self.metadata.client_id
    }

    /// The canonical redirect URI the callback route is served at.
    pub fn redirect_uri(&self) -> &str {
        &self.metadata.redirect_uris[0]
    }

    /// Direct access to the session store, for callers managing sessions
    /// outside the HTTP flow.
    pub fn session_store(&self) -> &SessionStore {
        &self.store
    }
}
