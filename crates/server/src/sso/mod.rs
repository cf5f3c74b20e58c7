//! Single-Sign-On against GitHub, Google and generic OpenID Connect providers.
//!
//! This module is organized into submodules:
//! - `registry` - stored provider configuration, resolved per request
//! - `state` - one-time CSRF state tokens
//! - `client` - OAuth2 Authorization Code client
//! - `discovery` - OIDC discovery documents and JWKS
//! - `providers` - GitHub and OIDC identity strategies
//! - `identity` - provider identity resolution
//! - `reconcile` - login, account provisioning and binding
//! - `session` - opaque session tokens
//! - `service` - the flow tying it all together
//! - `endpoints` / `admin` - HTTP handlers

pub mod admin;
pub mod client;
pub mod discovery;
pub mod endpoints;
pub mod identity;
pub mod password;
pub mod providers;
pub mod reconcile;
pub mod registry;
pub mod service;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use identity::ProviderIdentity;
pub use reconcile::{AccountReconciler, Reconciliation, UsernameAvailability};
pub use registry::{ProviderRegistry, ResolvedProvider};
pub use service::{CallbackResult, SsoService};
pub use session::SessionStore;
pub use state::{PendingLogin, StateStore};

/// Tag for OpenAPI documentation.
pub const SSO_TAG: &str = "SSO";
/// Tag for OpenAPI documentation of the provider configuration endpoints.
pub const SSO_CONFIG_TAG: &str = "SSO Configuration";
