//! HTTP surface: framework-agnostic handlers on
//! [`OAuthBff`](crate::OAuthBff) plus a bundled axum router.
//!
//! The handler methods consume plain [`http`] requests and produce
//! [`http::Response<String>`], so any framework that can hand over a
//! request can mount them. [`router`] wires them into axum for the common
//! case.

mod callback;
mod login;
mod logout;
mod session;

pub use session::SessionLookup;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};
use http::{HeaderValue, Response, StatusCode, Uri};
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::bff::OAuthBff;
use crate::metadata::ClientMetadata;

pub const LOGIN_PATH: &str = "/oauth/login";
pub const CALLBACK_PATH: &str = "/oauth/callback";
pub const LOGOUT_PATH: &str = "/oauth/logout";
pub const METADATA_PATH: &str = "/oauth-client-metadata.json";

/// Build an axum router serving the whole handler set.
pub fn router(bff: Arc<OAuthBff>) -> Router {
    Router::new()
        .route(LOGIN_PATH, get(login))
        .route(CALLBACK_PATH, get(callback))
        .route(METADATA_PATH, get(metadata))
        .route(LOGOUT_PATH, post(logout))
        .layer(TraceLayer::new_for_http())
        .with_state(bff)
}

async fn login(State(bff): State<Arc<OAuthBff>>, req: Request) -> axum::response::Response {
    let req = req.map(|_| ());
    bff.handle_login(&req).await.map(Body::from)
}

async fn callback(State(bff): State<Arc<OAuthBff>>, req: Request) -> axum::response::Response {
    let req = req.map(|_| ());
    bff.handle_callback(&req).await.map(Body::from)
}

async fn logout(State(bff): State<Arc<OAuthBff>>, req: Request) -> axum::response::Response {
    let req = req.map(|_| ());
    bff.handle_logout(&req).await.map(Body::from)
}

async fn metadata(State(bff): State<Arc<OAuthBff>>) -> Json<ClientMetadata> {
    Json(bff.client_metadata().clone())
}

/// Parse a query string into `params`, tolerating absent or unreadable
/// queries as the all-defaults struct. Individual handlers decide which
/// missing fields are fatal.
pub(crate) fn query<T: DeserializeOwned + Default>(uri: &Uri) -> T {
    serde_urlencoded::from_str(uri.query().unwrap_or("")).unwrap_or_default()
}

pub(crate) fn bad_request(message: impl Into<String>) -> Response<String> {
    let mut response = Response::new(message.into());
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

pub(crate) fn redirect_response(location: &str, cookies: &[&str]) -> Response<String> {
    let mut response = Response::new(String::new());
    match HeaderValue::from_str(location) {
        Ok(value) => {
            *response.status_mut() = StatusCode::FOUND;
            response.headers_mut().insert(LOCATION, value);
        }
        Err(err) => {
            error!("Redirect target is not a legal header value: {}", err);
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            *response.body_mut() = "Invalid redirect target".to_string();
        }
    }
    append_cookies(&mut response, cookies);
    response
}

pub(crate) fn html_response(body: String, cookie: Option<&str>) -> Response<String> {
    let mut response = Response::new(body);
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    if let Some(cookie) = cookie {
        append_cookies(&mut response, &[cookie]);
    }
    response
}

pub(crate) fn json_response(
    status: StatusCode,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> Response<String> {
    let mut response = Response::new(body.to_string());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(cookie) = cookie {
        append_cookies(&mut response, &[cookie]);
    }
    response
}

fn append_cookies(response: &mut Response<String>, cookies: &[&str]) {
    for cookie in cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(err) => error!("Dropping unencodable Set-Cookie header: {}", err),
        }
    }
}
