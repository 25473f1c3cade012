//! Flow intent carried through the authorization server's `state`
//! parameter.
//!
//! Nothing is held server-side between the redirect out and the callback
//! in; everything the callback needs to finish the flow rides inside the
//! opaque state string. The authorization server is trusted to deliver it
//! unmodified, but it is attacker-observable, so the redirect target is
//! re-validated on receipt rather than re-trusted.

use std::sync::OnceLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encoded state parameters larger than this are rejected before parsing.
const MAX_STATE_LEN: usize = 4096;

/// Handles longer than this are invalid regardless of shape.
const MAX_HANDLE_LEN: usize = 253;

#[derive(Debug, Error)]
pub enum FlowStateError {
    #[error("state parameter has an unacceptable length ({0} bytes)")]
    BadLength(usize),
    #[error("state parameter is not valid base64url")]
    BadEncoding,
    #[error("state payload is missing required fields or malformed")]
    BadPayload,
}

/// The payload round-tripped through the `state` parameter. Created by the
/// login handler, consumed exactly once by the callback handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    /// Identity handle or `https://` authorization-server URL.
    pub handle: String,
    /// Creation instant, epoch milliseconds. Staleness checks are the
    /// protocol client's job.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub redirect_path: Option<String>,
    #[serde(default)]
    pub mobile: bool,
    #[serde(default)]
    pub pwa: bool,
}

impl FlowState {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            timestamp: Utc::now().timestamp_millis(),
            redirect_path: None,
            mobile: false,
            pwa: false,
        }
    }

    /// Encode for the outbound `state` parameter.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(self)?))
    }

    /// Strict parse of an inbound `state` parameter. Unknown fields are
    /// ignored; bad encoding, an oversized payload, or a missing handle is
    /// a hard error, never an empty default flow.
    pub fn decode(raw: &str) -> Result<Self, FlowStateError> {
        if raw.is_empty() || raw.len() > MAX_STATE_LEN {
            return Err(FlowStateError::BadLength(raw.len()));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|_| FlowStateError::BadEncoding)?;
        let state: FlowState =
            serde_json::from_slice(&bytes).map_err(|_| FlowStateError::BadPayload)?;
        if state.handle.is_empty() {
            return Err(FlowStateError::BadPayload);
        }
        Ok(state)
    }
}

static HANDLE_REGEX: OnceLock<Regex> = OnceLock::new();

fn handle_regex() -> &'static Regex {
    HANDLE_REGEX.get_or_init(|| {
        Regex::new(
            r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$",
        )
        .expect("handle pattern is a valid regex")
    })
}

/// True for a syntactically valid atproto handle (`alice.example.com`).
/// `https://` authorization-server URLs skip this grammar upstream.
pub fn is_valid_handle(handle: &str) -> bool {
    handle.len() <= MAX_HANDLE_LEN && handle_regex().is_match(handle)
}

/// Validate a post-login redirect target: same-origin relative paths only,
/// starting with exactly one `/`. A leading `//` is browser-interpretable
/// as protocol-relative and is rejected as an open-redirect vector.
pub fn sanitize_redirect_path(path: &str) -> Option<&str> {
    if path.starts_with('/') && !path.starts_with("//") {
        Some(path)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips() {
        let mut state = FlowState::new("alice.bsky.social");
        state.redirect_path = Some("/dashboard".to_string());
        state.pwa = true;

        let encoded = state.encode().unwrap();
        assert_eq!(FlowState::decode(&encoded).unwrap(), state);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{"handle":"alice.bsky.social","timestamp":1,"surprise":"field"}"#;
        let encoded = URL_SAFE_NO_PAD.encode(json);
        let state = FlowState::decode(&encoded).unwrap();
        assert_eq!(state.handle, "alice.bsky.social");
        assert!(!state.mobile);
        assert!(!state.pwa);
        assert_eq!(state.redirect_path, None);
    }

    #[test]
    fn malformed_state_is_an_error_not_a_default() {
        assert!(FlowState::decode("").is_err());
        assert!(FlowState::decode("not!base64url").is_err());
        // Valid base64url, but not a flow payload.
        assert!(FlowState::decode(&URL_SAFE_NO_PAD.encode("[1,2,3]")).is_err());
        // Truncated JSON.
        let truncated = &URL_SAFE_NO_PAD.encode(r#"{"handle":"alice."#);
        assert!(FlowState::decode(truncated).is_err());
        // Empty handle never passes for a flow.
        let empty = URL_SAFE_NO_PAD.encode(r#"{"handle":"","timestamp":1}"#);
        assert!(FlowState::decode(&empty).is_err());
    }

    #[test]
    fn oversized_state_is_rejected() {
        let raw = "A".repeat(MAX_STATE_LEN + 1);
        assert!(matches!(
            FlowState::decode(&raw),
            Err(FlowStateError::BadLength(_))
        ));
    }

    #[test]
    fn handle_grammar() {
        assert!(is_valid_handle("alice.bsky.social"));
        assert!(is_valid_handle("a-b.example.com"));
        assert!(is_valid_handle("x.co"));
        assert!(!is_valid_handle("alice"));
        assert!(!is_valid_handle("@@@"));
        assert!(!is_valid_handle("has@@@at.signs"));
        assert!(!is_valid_handle("-leading.example.com"));
        assert!(!is_valid_handle("trailing-.example.com"));
        assert!(!is_valid_handle(".starts.with.dot"));
        assert!(!is_valid_handle(&"a.".repeat(200)));
    }

    #[test]
    fn redirect_paths_must_be_single_slash_relative() {
        assert_eq!(sanitize_redirect_path("/dashboard"), Some("/dashboard"));
        assert_eq!(sanitize_redirect_path("/a/b?c=d"), Some("/a/b?c=d"));
        assert_eq!(sanitize_redirect_path("//evil.com"), None);
        assert_eq!(sanitize_redirect_path("evil.com"), None);
        assert_eq!(sanitize_redirect_path("https://evil.com"), None);
        assert_eq!(sanitize_redirect_path(""), None);
    }
}
