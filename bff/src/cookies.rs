//! Sealed browser-session cookies.
//!
//! Payloads are sealed with the `cookie` crate's private jar
//! (authenticated encryption keyed off the configured secret), so the
//! browser holds only an opaque blob and the `did` inside cannot be read
//! or forged client-side.

use chrono::Utc;
use cookie::{Cookie, CookieJar, Key, SameSite};
use http::header::COOKIE;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use time::Duration;

/// Cookie name for the sealed session payload.
pub const SESSION_COOKIE_NAME: &str = "skygate_session";

/// Jar name under which out-of-band tokens are sealed.
const TOKEN_NAME: &str = "skygate_token";

/// Payload sealed inside the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub did: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    pub last_accessed: i64,
}

/// Why no session payload could be read from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieError {
    /// No session cookie on the request.
    Missing,
    /// Cookie present but failed to unseal or parse.
    Invalid,
}

/// Outcome of reading the session cookie off a request.
#[derive(Debug, Default)]
pub struct CookieOutcome {
    pub data: Option<SessionData>,
    /// Refreshed cookie with a slid expiry, produced whenever the inbound
    /// cookie unsealed successfully.
    pub set_cookie: Option<String>,
    pub error: Option<CookieError>,
}

/// Seals and unseals the browser session cookie.
pub struct CookieSessions {
    key: Key,
    ttl_secs: i64,
    secure: bool,
}

impl CookieSessions {
    /// `secret` must be at least 32 bytes; configuration validation
    /// guarantees this before the jar key is derived.
    pub fn new(secret: &str, ttl_secs: u64, secure: bool) -> Self {
        Self {
            key: Key::derive_from(secret.as_bytes()),
            ttl_secs: ttl_secs as i64,
            secure,
        }
    }

    /// Mint a new session cookie for `did`. Returns a full `Set-Cookie`
    /// header value.
    pub fn create_session(&self, did: &str) -> String {
        let now = Utc::now().timestamp_millis();
        self.session_cookie(&SessionData {
            did: did.to_string(),
            created_at: now,
            last_accessed: now,
        })
    }

    /// Read and unseal the session cookie from request headers. A valid
    /// cookie also yields a refreshed `Set-Cookie` that slides the expiry.
    pub fn session_from_request(&self, headers: &HeaderMap) -> CookieOutcome {
        let Some(raw) = find_cookie_value(headers, SESSION_COOKIE_NAME) else {
            return CookieOutcome {
                error: Some(CookieError::Missing),
                ..Default::default()
            };
        };

        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new(SESSION_COOKIE_NAME, raw));
        let Some(unsealed) = jar.private(&self.key).get(SESSION_COOKIE_NAME) else {
            return CookieOutcome {
                error: Some(CookieError::Invalid),
                ..Default::default()
            };
        };

        let Ok(mut data) = serde_json::from_str::<SessionData>(unsealed.value()) else {
            return CookieOutcome {
                error: Some(CookieError::Invalid),
                ..Default::default()
            };
        };

        data.last_accessed = Utc::now().timestamp_millis();
        let set_cookie = self.session_cookie(&data);
        CookieOutcome {
            data: Some(data),
            set_cookie: Some(set_cookie),
            error: None,
        }
    }

    /// `Set-Cookie` value that expires the session cookie immediately.
    pub fn clear_cookie_header(&self) -> String {
        let mut cookie = Cookie::new(SESSION_COOKIE_NAME, "");
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_secure(self.secure);
        cookie.set_max_age(Duration::ZERO);
        cookie.to_string()
    }

    /// Seal an opaque token with no cookie attributes, for out-of-band
    /// hand-off such as the native-app `session_token`.
    pub fn seal_token(&self, payload: &serde_json::Value) -> String {
        let mut jar = CookieJar::new();
        jar.private_mut(&self.key)
            .add(Cookie::new(TOKEN_NAME, payload.to_string()));
        jar.get(TOKEN_NAME)
            .map(|cookie| cookie.value().to_string())
            .expect("token was just added to the jar")
    }

    fn session_cookie(&self, data: &SessionData) -> String {
        let payload = serde_json::json!({
            "did": data.did,
            "created_at": data.created_at,
            "last_accessed": data.last_accessed,
        })
        .to_string();

        let mut jar = CookieJar::new();
        jar.private_mut(&self.key)
            .add(Cookie::new(SESSION_COOKIE_NAME, payload));
        let sealed = jar
            .get(SESSION_COOKIE_NAME)
            .expect("session cookie was just added to the jar");

        let mut cookie = sealed.clone();
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.secure);
        cookie.set_max_age(Duration::seconds(self.ttl_secs));
        cookie.encoded().to_string()
    }
}

/// Pull a named cookie's decoded value out of the `Cookie` header(s).
fn find_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(header) = header.to_str() else {
            continue;
        };
        for fragment in header.split(';') {
            if let Ok(cookie) = Cookie::parse_encoded(fragment.trim()) {
                if cookie.name() == name {
                    return Some(cookie.value().to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    const SECRET: &str = "an-extremely-well-kept-test-secret!!";

    fn sessions() -> CookieSessions {
        CookieSessions::new(SECRET, 604_800, true)
    }

    /// Turn a `Set-Cookie` value into request headers carrying it back.
    fn request_headers(set_cookie: &str) -> HeaderMap {
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(pair).unwrap());
        headers
    }

    #[test]
    fn minted_cookie_round_trips() {
        let sessions = sessions();
        let set_cookie = sessions.create_session("did:plc:test");
        assert!(set_cookie.starts_with("skygate_session="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Secure"));
        assert!(set_cookie.contains("SameSite=Lax"));
        assert!(set_cookie.contains("Path=/"));
        // The did never appears in clear text.
        assert!(!set_cookie.contains("did:plc:test"));

        let outcome = sessions.session_from_request(&request_headers(&set_cookie));
        assert!(outcome.error.is_none());
        assert_eq!(outcome.data.unwrap().did, "did:plc:test");
        // Reading slides the expiry via a refreshed cookie.
        assert!(outcome.set_cookie.is_some());
    }

    #[test]
    fn absent_cookie_is_distinct_from_invalid() {
        let sessions = sessions();

        let outcome = sessions.session_from_request(&HeaderMap::new());
        assert_eq!(outcome.error, Some(CookieError::Missing));
        assert!(outcome.data.is_none());
        assert!(outcome.set_cookie.is_none());

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("skygate_session=not-a-sealed-value"),
        );
        let outcome = sessions.session_from_request(&headers);
        assert_eq!(outcome.error, Some(CookieError::Invalid));
        assert!(outcome.data.is_none());
    }

    #[test]
    fn cookies_sealed_under_another_key_do_not_unseal() {
        let minted = sessions().create_session("did:plc:test");
        let other = CookieSessions::new("a-completely-different-secret-here!", 604_800, true);
        let outcome = other.session_from_request(&request_headers(&minted));
        assert_eq!(outcome.error, Some(CookieError::Invalid));
    }

    #[test]
    fn clear_header_expires_immediately() {
        let header = sessions().clear_cookie_header();
        assert!(header.starts_with("skygate_session="));
        assert!(header.contains("Max-Age=0"));
    }

    #[test]
    fn sealed_tokens_are_opaque() {
        let sessions = sessions();
        let token = sessions.seal_token(&serde_json::json!({
            "did": "did:plc:test",
            "handle": "alice.bsky.social",
        }));
        assert!(!token.is_empty());
        assert!(!token.contains("did:plc:test"));
        assert!(!token.contains("alice.bsky.social"));
    }
}
