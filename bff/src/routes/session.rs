use http::Request;
use tracing::warn;

use crate::bff::OAuthBff;
use crate::client::OAuthSession;
use crate::cookies::CookieError;
use crate::error::{SessionError, SessionErrorKind};

/// Result of resolving a request's cookie into a live OAuth session.
#[derive(Debug, Default)]
pub struct SessionLookup {
    pub session: Option<OAuthSession>,
    /// Refreshed cookie to forward whenever the cookie layer slid the
    /// expiry, including when the stored session itself turned out to be
    /// gone.
    pub set_cookie: Option<String>,
    pub error: Option<SessionError>,
}

impl OAuthBff {
    /// Resolve the session cookie on `req` into a live, auto-refreshed
    /// OAuth session. Every failure is reported through
    /// [`SessionLookup::error`]; this operation never surfaces an
    /// exception to its caller. Without a readable cookie no storage
    /// access happens at all.
    pub async fn get_session_from_request<B>(&self, req: &Request<B>) -> SessionLookup {
        let outcome = self.cookies.session_from_request(req.headers());

        let data = match (outcome.data, outcome.error) {
            (Some(data), _) => data,
            (None, Some(CookieError::Missing)) => {
                return SessionLookup {
                    error: Some(SessionError::new(
                        SessionErrorKind::NoCookie,
                        "No session cookie present",
                    )),
                    ..Default::default()
                };
            }
            (None, _) => {
                return SessionLookup {
                    error: Some(SessionError::new(
                        SessionErrorKind::InvalidCookie,
                        "Session cookie could not be read",
                    )),
                    ..Default::default()
                };
            }
        };

        match self.store.restore(&data.did).await {
            Ok(Some(session)) => SessionLookup {
                session: Some(session),
                set_cookie: outcome.set_cookie,
                error: None,
            },
            Ok(None) => {
                warn!("No restorable session for {}", data.did);
                SessionLookup {
                    session: None,
                    set_cookie: outcome.set_cookie,
                    error: Some(SessionError::new(
                        SessionErrorKind::SessionExpired,
                        "Session expired or no longer valid",
                    )),
                }
            }
            Err(err) => SessionLookup {
                session: None,
                set_cookie: outcome.set_cookie,
                error: Some(
                    SessionError::new(SessionErrorKind::OauthError, "Failed to restore session")
                        .with_details(err.to_string()),
                ),
            },
        }
    }
}
