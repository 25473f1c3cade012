//! Boundary to the OAuth protocol client.
//!
//! The protocol client owns authorization-server discovery, PAR/PKCE
//! construction, DPoP proofs, token exchange, and refresh. This crate only
//! calls the three operations below and classifies their failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A live OAuth session for one subject, as produced and restored by the
/// protocol client. This is also the wire form persisted by
/// [`SessionStore`](crate::SessionStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthSession {
    /// Stable subject identifier.
    pub did: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub handle: Option<String>,
    /// The identity's data-hosting endpoint, base for authenticated calls.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pds_url: Option<String>,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Options forwarded when starting an authorization.
#[derive(Debug, Clone, Default)]
pub struct AuthorizeOptions {
    /// Opaque state round-tripped through the authorization server.
    pub state: String,
    pub scope: Option<String>,
    /// e.g. `create` to force account creation on the provider.
    pub prompt: Option<String>,
}

/// Query parameters delivered by the authorization server on callback.
#[derive(Debug, Clone)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
    pub iss: Option<String>,
}

/// Result of a completed code exchange.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub session: OAuthSession,
    /// The state parameter as the client saw it, echoed back.
    pub state: Option<String>,
}

/// Failure kinds at the protocol-client boundary.
///
/// The session store keys its recovery policy off
/// [`is_transient`](Self::is_transient): transport failures are retryable
/// and must propagate; every other kind is terminal for the stored
/// session.
#[derive(Debug, Error)]
pub enum OAuthClientError {
    /// Transport-level failure talking to the authorization server or PDS.
    #[error("network error: {0}")]
    Network(String),
    /// The server that completed the flow is not authoritative for the
    /// resolved identity. Carries the subject's declared handle when the
    /// client could recover it.
    #[error("authorization server is not authoritative for this identity")]
    IssuerMismatch { handle: Option<String> },
    /// Stored session data could not be deserialized.
    #[error("stored session is corrupt: {0}")]
    CorruptSession(String),
    /// The refresh token was rejected as expired or revoked.
    #[error("token expired or revoked: {0}")]
    TokenExpired(String),
    /// Any other protocol-level failure.
    #[error("{0}")]
    Protocol(String),
}

impl OAuthClientError {
    /// True only for failures worth retrying. Everything else means the
    /// stored session cannot be recovered.
    pub fn is_transient(&self) -> bool {
        matches!(self, OAuthClientError::Network(_))
    }
}

/// The OAuth protocol client contract.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Build an authorization URL for `input`, which is either an identity
    /// handle or an `https://` authorization-server URL.
    async fn authorize(
        &self,
        input: &str,
        options: AuthorizeOptions,
    ) -> Result<String, OAuthClientError>;

    /// Exchange a callback's authorization code for a live session.
    async fn callback(&self, params: CallbackParams) -> Result<CallbackOutcome, OAuthClientError>;

    /// Restore the stored session for `did`, refreshing tokens if needed.
    /// Returns `None` when the subject has no session.
    async fn restore(&self, did: &str) -> Result<Option<OAuthSession>, OAuthClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_transient() {
        assert!(OAuthClientError::Network("timed out".into()).is_transient());
        assert!(!OAuthClientError::IssuerMismatch { handle: None }.is_transient());
        assert!(!OAuthClientError::CorruptSession("bad json".into()).is_transient());
        assert!(!OAuthClientError::TokenExpired("revoked".into()).is_transient());
        assert!(!OAuthClientError::Protocol("invalid_grant".into()).is_transient());
    }

    #[test]
    fn session_round_trips_through_json() {
        let session = OAuthSession {
            did: "did:plc:test".into(),
            handle: Some("alice.bsky.social".into()),
            pds_url: Some("https://pds.example.com".into()),
            access_token: "token".into(),
            refresh_token: None,
            expires_at: None,
        };
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(serde_json::from_value::<OAuthSession>(value).unwrap(), session);
    }
}
