use http::{Request, Response};
use serde::Deserialize;
use tracing::{info, warn};

use crate::bff::OAuthBff;
use crate::client::AuthorizeOptions;
use crate::flow::{self, FlowState};

use super::{bad_request, query, redirect_response};

#[derive(Debug, Default, Deserialize)]
struct LoginParams {
    /// Identity handle, or an `https://` authorization-server URL for
    /// provider-picker flows.
    handle: Option<String>,
    redirect: Option<String>,
    mobile: Option<String>,
    pwa: Option<String>,
    /// Forwarded to the authorization request, e.g. `create`.
    prompt: Option<String>,
}

fn flag(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("true") | Some("1"))
}

impl OAuthBff {
    /// Begin a login: validate the handle, capture flow intent into the
    /// opaque `state` parameter, and redirect to the authorization server.
    pub async fn handle_login<B>(&self, req: &Request<B>) -> Response<String> {
        let params: LoginParams = query(req.uri());

        let Some(handle) = params
            .handle
            .as_deref()
            .map(str::trim)
            .filter(|handle| !handle.is_empty())
        else {
            return bad_request("Invalid handle");
        };
        if !handle.starts_with("https://") && !flow::is_valid_handle(handle) {
            return bad_request("Invalid handle format");
        }

        let mut state = FlowState::new(handle);
        state.mobile = flag(&params.mobile);
        state.pwa = flag(&params.pwa);
        if let Some(redirect) = params.redirect.as_deref() {
            match flow::sanitize_redirect_path(redirect) {
                Some(path) => state.redirect_path = Some(path.to_string()),
                // Not fatal; the flow continues without a redirect target.
                None => warn!("Dropping unsafe redirect target: {:?}", redirect),
            }
        }

        let encoded = match state.encode() {
            Ok(encoded) => encoded,
            Err(err) => return bad_request(format!("Failed to start login: {err}")),
        };

        let options = AuthorizeOptions {
            state: encoded,
            scope: Some(self.config.oauth_scope.clone()),
            prompt: params.prompt.clone(),
        };
        match self.client.authorize(handle, options).await {
            Ok(url) => {
                info!("Redirecting {} to the authorization server", handle);
                redirect_response(&url, &[])
            }
            Err(err) => bad_request(format!("OAuth login failed: {err}")),
        }
    }
}
