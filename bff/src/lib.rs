//! OAuth backend-for-frontend glue for atproto services.
//!
//! This crate coordinates three collaborators into a small set of HTTP
//! route handlers: an OAuth protocol client (authorization, code exchange,
//! DPoP-bound refresh), a sealed-cookie session layer, and a pluggable
//! key-value storage backend. The handlers operate on plain [`http`]
//! request and response types, so they work from any web framework; a
//! bundled axum router is available in [`routes`].
//!
//! The embedding application supplies the [`OAuthClient`] implementation
//! and a [`Storage`] backend; everything else is built by [`OAuthBff`]
//! from an [`AuthConfig`].

pub mod bff;
pub mod client;
pub mod config;
pub mod cookies;
pub mod error;
pub mod flow;
pub mod metadata;
pub mod routes;
pub mod storage;
pub mod store;

pub use bff::OAuthBff;
pub use client::{
    AuthorizeOptions, CallbackOutcome, CallbackParams, OAuthClient, OAuthClientError, OAuthSession,
};
pub use config::AuthConfig;
pub use error::{ConfigError, SessionError, SessionErrorKind};
pub use metadata::ClientMetadata;
pub use routes::SessionLookup;
pub use storage::{MemoryStorage, Storage, StorageError};
pub use store::{session_key, SessionStore};
