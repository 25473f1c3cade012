use http::{Request, Response, StatusCode};
use tracing::{error, info};

use crate::bff::OAuthBff;

use super::json_response;

impl OAuthBff {
    /// End the browser session. Deleting the stored OAuth record is best
    /// effort; clearing the cookie is the primary guarantee and happens on
    /// every path.
    pub async fn handle_logout<B>(&self, req: &Request<B>) -> Response<String> {
        let clear_cookie = self.cookies.clear_cookie_header();

        let mut failure = None;
        if let Some(data) = self.cookies.session_from_request(req.headers()).data {
            match self.store.delete(&data.did).await {
                Ok(()) => info!("Deleted stored session for {}", data.did),
                Err(err) => {
                    error!("Failed to delete stored session for {}: {}", data.did, err);
                    failure = Some(err.to_string());
                }
            }
        }

        match failure {
            None => json_response(
                StatusCode::OK,
                serde_json::json!({ "success": true }),
                Some(&clear_cookie),
            ),
            Some(err) => json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "success": false, "error": err }),
                Some(&clear_cookie),
            ),
        }
    }
}
