use serde::Serialize;
use thiserror::Error;

/// Configuration problems, surfaced at composition time rather than on the
/// first request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("base URL must not be empty")]
    MissingBaseUrl,
    #[error("base URL is not a valid URL: {0}")]
    InvalidBaseUrl(String),
    #[error("application name must not be empty")]
    MissingAppName,
    #[error("cookie secret must be at least 32 characters")]
    CookieSecretTooShort,
}

/// Why a request could not be resolved to a live session.
///
/// Serialized with the wire names the session-lookup contract fixes
/// (`NO_COOKIE`, `INVALID_COOKIE`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionErrorKind {
    /// No session cookie on the request.
    NoCookie,
    /// A cookie was present but could not be unsealed or parsed.
    InvalidCookie,
    /// The stored session is gone, corrupt, or terminally invalid.
    SessionExpired,
    /// Session restoration failed in a way the store did not absorb.
    OauthError,
    Unknown,
}

/// Typed error attached to a failed session lookup.
#[derive(Debug, Clone, Serialize)]
pub struct SessionError {
    #[serde(rename = "type")]
    pub kind: SessionErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl SessionError {
    pub fn new(kind: SessionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
