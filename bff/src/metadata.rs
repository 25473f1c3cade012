//! Self-describing OAuth client registration document.

use serde::Serialize;
use url::{Host, Url};

use crate::config::AuthConfig;
use crate::error::ConfigError;
use crate::routes::{CALLBACK_PATH, METADATA_PATH};

/// The client metadata document served at
/// [`METADATA_PATH`](crate::routes::METADATA_PATH). Recomputed from
/// configuration once at composition time, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientMetadata {
    pub client_id: String,
    pub client_name: String,
    pub client_uri: String,
    pub application_type: &'static str,
    pub grant_types: [&'static str; 2],
    pub response_types: [&'static str; 1],
    pub scope: String,
    pub redirect_uris: [String; 1],
    pub token_endpoint_auth_method: &'static str,
    pub dpop_bound_access_tokens: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_uri: Option<String>,
}

impl ClientMetadata {
    /// Build the registration document for `config`. Pure: identical
    /// configuration yields an identical document.
    ///
    /// Loopback hosts get the identity-assertion form for clients that are
    /// not publicly reachable: the redirect URI is rewritten onto
    /// `127.0.0.1` (preserving any explicit port) and the `client_id`
    /// encodes the redirect URI and scope inline instead of pointing at a
    /// hosted metadata document.
    pub fn generate(config: &AuthConfig) -> Result<Self, ConfigError> {
        let base = config.base_url.trim_end_matches('/');
        let parsed =
            Url::parse(base).map_err(|err| ConfigError::InvalidBaseUrl(err.to_string()))?;

        let loopback = is_loopback_host(&parsed);
        let redirect_uri = if loopback {
            let port = parsed
                .port()
                .map(|port| format!(":{port}"))
                .unwrap_or_default();
            format!("{}://127.0.0.1{port}{CALLBACK_PATH}", parsed.scheme())
        } else {
            format!("{base}{CALLBACK_PATH}")
        };

        let client_id = if loopback {
            format!(
                "http://localhost?redirect_uri={}&scope={}",
                urlencoding::encode(&redirect_uri),
                urlencoding::encode(&config.oauth_scope),
            )
        } else {
            format!("{base}{METADATA_PATH}")
        };

        Ok(Self {
            client_id,
            client_name: config.app_name.clone(),
            client_uri: base.to_string(),
            application_type: "web",
            grant_types: ["authorization_code", "refresh_token"],
            response_types: ["code"],
            scope: config.oauth_scope.clone(),
            redirect_uris: [redirect_uri],
            token_endpoint_auth_method: "none",
            dpop_bound_access_tokens: true,
            logo_uri: config.logo_uri.clone(),
            policy_uri: config.policy_uri.clone(),
        })
    }
}

/// `localhost`, `127.0.0.1`, and the IPv6 loopback literal all count as
/// development hosts, whatever the port.
fn is_loopback_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(addr)) => addr.is_loopback(),
        Some(Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::MemoryStorage;

    fn config(base_url: &str) -> AuthConfig {
        AuthConfig::new(
            base_url,
            "Example App",
            "0123456789abcdef0123456789abcdef",
            Arc::new(MemoryStorage::new()),
        )
    }

    #[test]
    fn production_metadata_points_at_the_hosted_document() {
        let metadata = ClientMetadata::generate(&config("https://app.example.com")).unwrap();
        assert_eq!(
            metadata.client_id,
            "https://app.example.com/oauth-client-metadata.json"
        );
        assert_eq!(
            metadata.redirect_uris,
            ["https://app.example.com/oauth/callback".to_string()]
        );
        assert_eq!(metadata.client_uri, "https://app.example.com");
        assert_eq!(metadata.application_type, "web");
        assert_eq!(metadata.grant_types, ["authorization_code", "refresh_token"]);
        assert_eq!(metadata.response_types, ["code"]);
        assert_eq!(metadata.token_endpoint_auth_method, "none");
        assert!(metadata.dpop_bound_access_tokens);
    }

    #[test]
    fn loopback_hosts_get_the_identity_assertion_form() {
        for base in [
            "http://localhost:3000",
            "http://127.0.0.1:3000",
            "http://[::1]:3000",
        ] {
            let metadata = ClientMetadata::generate(&config(base)).unwrap();
            assert_eq!(
                metadata.redirect_uris,
                ["http://127.0.0.1:3000/oauth/callback".to_string()],
                "for base {base}"
            );
            assert!(
                metadata.client_id.starts_with("http://localhost?redirect_uri="),
                "for base {base}"
            );
        }
    }

    #[test]
    fn loopback_without_port_has_no_port_in_the_redirect() {
        let metadata = ClientMetadata::generate(&config("http://localhost")).unwrap();
        assert_eq!(
            metadata.redirect_uris,
            ["http://127.0.0.1/oauth/callback".to_string()]
        );
    }

    #[test]
    fn loopback_client_id_round_trips_its_query() {
        let metadata = ClientMetadata::generate(&config("http://localhost:8080")).unwrap();
        let parsed = Url::parse(&metadata.client_id).unwrap();
        let mut redirect_uri = None;
        let mut scope = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "redirect_uri" => redirect_uri = Some(value.into_owned()),
                "scope" => scope = Some(value.into_owned()),
                other => panic!("unexpected query key {other}"),
            }
        }
        assert_eq!(
            redirect_uri.as_deref(),
            Some("http://127.0.0.1:8080/oauth/callback")
        );
        assert_eq!(scope.as_deref(), Some("atproto transition:generic"));
    }

    #[test]
    fn trailing_slash_never_reaches_derived_urls() {
        let metadata = ClientMetadata::generate(&config("https://app.example.com/")).unwrap();
        assert_eq!(
            metadata.client_id,
            "https://app.example.com/oauth-client-metadata.json"
        );
        assert_eq!(metadata.client_uri, "https://app.example.com");
        assert!(!metadata.redirect_uris[0].contains("com//"));
    }

    #[test]
    fn generation_is_pure() {
        let config = config("https://app.example.com")
            .with_logo_uri("https://app.example.com/logo.png");
        let first = serde_json::to_string(&ClientMetadata::generate(&config).unwrap()).unwrap();
        let second = serde_json::to_string(&ClientMetadata::generate(&config).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn optional_uris_serialize_only_when_configured() {
        let bare = ClientMetadata::generate(&config("https://app.example.com")).unwrap();
        let json = serde_json::to_string(&bare).unwrap();
        assert!(!json.contains("logo_uri"));
        assert!(!json.contains("policy_uri"));

        let configured = config("https://app.example.com")
            .with_logo_uri("https://app.example.com/logo.png")
            .with_policy_uri("https://app.example.com/privacy");
        let json =
            serde_json::to_string(&ClientMetadata::generate(&configured).unwrap()).unwrap();
        assert!(json.contains("\"logo_uri\":\"https://app.example.com/logo.png\""));
        assert!(json.contains("\"policy_uri\":\"https://app.example.com/privacy\""));
    }
}
