use chrono::Utc;
use http::{Request, Response};
use maud::{html, PreEscaped, DOCTYPE};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::bff::OAuthBff;
use crate::client::{CallbackParams, OAuthClientError, OAuthSession};
use crate::flow::{self, FlowState};

use super::{bad_request, html_response, query, redirect_response, LOGIN_PATH};

/// Client-side key the confirmation page writes the completion payload to.
/// The opener polls this after its live message channel has gone quiet.
const RESULT_STORAGE_KEY: &str = "skygate:login-result";

#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    iss: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Delivery mode for a completed callback, in precedence order: native-app
/// redirect wins when a scheme is configured, then the PWA confirmation
/// page, then the standard web redirect.
enum FlowMode {
    Mobile,
    Pwa,
    Web,
}

fn flow_mode(state: &FlowState, mobile_scheme: &str) -> FlowMode {
    if state.mobile && !mobile_scheme.is_empty() {
        FlowMode::Mobile
    } else if state.pwa {
        FlowMode::Pwa
    } else {
        FlowMode::Web
    }
}

impl OAuthBff {
    /// Complete the callback leg: exchange the code, persist the session,
    /// mint the cookie, and deliver per the flow mode recorded in `state`.
    pub async fn handle_callback<B>(&self, req: &Request<B>) -> Response<String> {
        let params: CallbackQuery = query(req.uri());

        if let Some(oauth_error) = params.error.as_deref() {
            let description = params
                .error_description
                .as_deref()
                .unwrap_or("no description provided");
            error!(
                "Authorization server reported an error: {} ({})",
                oauth_error, description
            );
            return bad_request(format!("OAuth error: {oauth_error}: {description}"));
        }

        let (Some(code), Some(raw_state)) = (params.code.as_deref(), params.state.as_deref())
        else {
            return bad_request("Missing code or state parameter");
        };

        // A forged or truncated state must never pass for an empty flow.
        let state = match FlowState::decode(raw_state) {
            Ok(state) => state,
            Err(err) => {
                warn!("Rejecting callback with undecodable state: {}", err);
                return bad_request("Invalid state parameter");
            }
        };

        let callback_params = CallbackParams {
            code: code.to_string(),
            state: raw_state.to_string(),
            iss: params.iss.clone(),
        };
        let outcome = match self.client.callback(callback_params).await {
            Ok(outcome) => outcome,
            Err(OAuthClientError::IssuerMismatch {
                handle: Some(handle),
            }) => {
                // The user picked a provider that is not authoritative for
                // their identity; restart the flow against the right one.
                info!("Issuer mismatch, re-authorizing as {}", handle);
                let location = format!("{LOGIN_PATH}?handle={}", urlencoding::encode(&handle));
                return redirect_response(&location, &[]);
            }
            Err(err) => return bad_request(format!("OAuth callback failed: {err}")),
        };

        let session = outcome.session;
        if let Err(err) = self.store.save(&session).await {
            error!("Failed to persist session for {}: {}", session.did, err);
            return bad_request(format!("Failed to persist session: {err}"));
        }

        let cookie = self.cookies.create_session(&session.did);
        info!("Authentication complete for {}", session.did);

        match flow_mode(&state, &self.config.mobile_scheme) {
            FlowMode::Mobile => self.mobile_response(&session, &cookie),
            FlowMode::Pwa => self.pwa_response(&session, &cookie),
            FlowMode::Web => {
                let target = state
                    .redirect_path
                    .as_deref()
                    .and_then(flow::sanitize_redirect_path)
                    .unwrap_or("/");
                redirect_response(target, &[&cookie])
            }
        }
    }

    /// Hand the session off to a native client via the configured scheme.
    /// The scheme is server-configured only, so a caller cannot steer the
    /// redirect into an arbitrary app.
    fn mobile_response(&self, session: &OAuthSession, cookie: &str) -> Response<String> {
        let handle = session.handle.as_deref().unwrap_or(&session.did);
        let token = self.cookies.seal_token(&serde_json::json!({
            "did": session.did,
            "handle": handle,
            "issued_at": Utc::now().timestamp_millis(),
        }));
        let location = format!(
            "{}?session_token={}&did={}&handle={}",
            self.config.mobile_scheme,
            urlencoding::encode(&token),
            urlencoding::encode(&session.did),
            urlencoding::encode(handle),
        );
        // The cookie still rides along as a web fallback.
        redirect_response(&location, &[cookie])
    }

    /// Confirmation page for popup flows. The opener's live message
    /// channel is unreliable once navigation has crossed a third-party
    /// domain, so the page persists the result client-side for the opener
    /// to pick up. Deliberately carries no tokens.
    fn pwa_response(&self, session: &OAuthSession, cookie: &str) -> Response<String> {
        let handle = session.handle.as_deref().unwrap_or(&session.did);
        let payload = serde_json::json!({
            "did": session.did,
            "handle": handle,
            "success": true,
            "timestamp": Utc::now().timestamp_millis(),
        })
        .to_string()
        .replace('<', "\\u003c");

        let script = format!(
            "var result = {payload};\n\
             try {{ localStorage.setItem('{RESULT_STORAGE_KEY}', JSON.stringify(result)); }} catch (e) {{}}\n\
             if (window.opener) {{ try {{ window.opener.postMessage(result, window.location.origin); }} catch (e) {{}} }}\n\
             setTimeout(function () {{ window.close(); }}, 400);"
        );

        let page = html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { "Login complete" }
                }
                body {
                    p { "Signed in to " (self.config.app_name) " as " (handle) " (" (session.did) ")." }
                    p { "You can close this window." }
                    script { (PreEscaped(script)) }
                }
            }
        };
        html_response(page.into_string(), Some(cookie))
    }
}
