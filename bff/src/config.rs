use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use url::Url;

use crate::error::ConfigError;
use crate::storage::Storage;

/// Default session lifetime: 7 days.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 604_800;

/// Protocol-advised ceiling for public clients: 14 days.
pub const MAX_SESSION_TTL_SECS: u64 = 1_209_600;

/// Default OAuth scope requested from the authorization server.
pub const DEFAULT_OAUTH_SCOPE: &str = "atproto transition:generic";

/// Default URL scheme for the native-app callback hand-off.
pub const DEFAULT_MOBILE_SCHEME: &str = "app://auth-callback";

/// Cookie secrets shorter than this are rejected at composition time.
pub const MIN_COOKIE_SECRET_CHARS: usize = 32;

/// Application configuration for [`OAuthBff`](crate::OAuthBff).
///
/// Built with [`AuthConfig::new`] and customized through the `with_*`
/// methods; validated once, eagerly, when the handler set is composed.
#[derive(Clone)]
pub struct AuthConfig {
    /// Public origin the app is served from, e.g. `https://app.example.com`.
    pub base_url: String,
    /// Display name shown on the authorization server's consent screen.
    pub app_name: String,
    /// Secret the session-cookie sealing key is derived from.
    pub cookie_secret: String,
    pub storage: Arc<dyn Storage>,
    pub session_ttl: Duration,
    pub oauth_scope: String,
    /// Scheme for the native-app callback redirect. Set to an empty string
    /// to disable the mobile hand-off entirely.
    pub mobile_scheme: String,
    pub logo_uri: Option<String>,
    pub policy_uri: Option<String>,
}

impl AuthConfig {
    pub fn new(
        base_url: impl Into<String>,
        app_name: impl Into<String>,
        cookie_secret: impl Into<String>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            app_name: app_name.into(),
            cookie_secret: cookie_secret.into(),
            storage,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            oauth_scope: DEFAULT_OAUTH_SCOPE.to_string(),
            mobile_scheme: DEFAULT_MOBILE_SCHEME.to_string(),
            logo_uri: None,
            policy_uri: None,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_oauth_scope(mut self, scope: impl Into<String>) -> Self {
        self.oauth_scope = scope.into();
        self
    }

    pub fn with_mobile_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.mobile_scheme = scheme.into();
        self
    }

    pub fn with_logo_uri(mut self, uri: impl Into<String>) -> Self {
        self.logo_uri = Some(uri.into());
        self
    }

    pub fn with_policy_uri(mut self, uri: impl Into<String>) -> Self {
        self.policy_uri = Some(uri.into());
        self
    }

    /// Fail-fast validation, run once at composition time. Also strips any
    /// trailing slash from the base URL so it never leaks into derived
    /// URLs.
    pub(crate) fn validate(&mut self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        Url::parse(&self.base_url).map_err(|err| ConfigError::InvalidBaseUrl(err.to_string()))?;

        if self.app_name.trim().is_empty() {
            return Err(ConfigError::MissingAppName);
        }
        if self.cookie_secret.chars().count() < MIN_COOKIE_SECRET_CHARS {
            return Err(ConfigError::CookieSecretTooShort);
        }
        if self.session_ttl.as_secs() > MAX_SESSION_TTL_SECS {
            warn!(
                "Session TTL of {}s exceeds the advised ceiling for public clients ({}s)",
                self.session_ttl.as_secs(),
                MAX_SESSION_TTL_SECS
            );
        }
        Ok(())
    }

    /// Whether minted cookies should carry the `Secure` attribute.
    pub(crate) fn wants_secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}
