//! Per-family protocol handling.
//!
//! GitHub speaks plain OAuth2 plus a REST user endpoint; everything else is an
//! OpenID Connect issuer. The two strategies expose the same capability: the
//! endpoints to drive the Authorization Code flow, and identity resolution
//! from the exchanged token.

pub mod github;
pub mod oidc;

use crate::error::SsoError;
use crate::sso::client::{OAuthHttp, TokenResponse};
use crate::sso::discovery::OidcDiscovery;
use crate::sso::identity::ProviderIdentity;
use serde::Deserialize;
use url::Url;

/// Optional overrides stored as JSON in `sso_config.ext`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendedConfig {
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub user_info_endpoint: Option<String>,
    pub emails_endpoint: Option<String>,
    pub issuer_url: Option<String>,
    pub scopes: Option<Vec<String>>,
}

impl ExtendedConfig {
    /// Parse the stored JSON; blank or malformed input yields no overrides.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::default();
        }
        serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring malformed provider ext config");
            Self::default()
        })
    }

    fn scopes_or(&self, defaults: &[&str]) -> Vec<String> {
        match &self.scopes {
            Some(scopes) if !scopes.is_empty() => scopes.clone(),
            _ => defaults.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Parse an endpoint, preferring a non-empty override.
pub(crate) fn endpoint(overridden: Option<&str>, default: &str, what: &str) -> Result<Url, String> {
    let raw = overridden
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default);
    Url::parse(raw).map_err(|e| format!("invalid {what} {raw}: {e}"))
}

/// Resolved protocol handling for one provider.
#[derive(Debug, Clone)]
pub enum ProviderStrategy {
    GitHub(github::GitHubProvider),
    Oidc(oidc::OidcProvider),
}

impl ProviderStrategy {
    pub fn authorization_endpoint(&self) -> &Url {
        match self {
            ProviderStrategy::GitHub(p) => &p.authorization_endpoint,
            ProviderStrategy::Oidc(p) => &p.authorization_endpoint,
        }
    }

    pub fn token_endpoint(&self) -> &Url {
        match self {
            ProviderStrategy::GitHub(p) => &p.token_endpoint,
            ProviderStrategy::Oidc(p) => &p.token_endpoint,
        }
    }

    pub fn scopes(&self) -> &[String] {
        match self {
            ProviderStrategy::GitHub(p) => &p.scopes,
            ProviderStrategy::Oidc(p) => &p.scopes,
        }
    }

    /// Extract the provider identity from an exchanged token.
    pub async fn resolve_identity(
        &self,
        http: &OAuthHttp,
        discovery: &OidcDiscovery,
        token: &TokenResponse,
    ) -> Result<ProviderIdentity, SsoError> {
        match self {
            ProviderStrategy::GitHub(p) => p.resolve_identity(http, &token.access_token).await,
            ProviderStrategy::Oidc(p) => p.resolve_identity(http, discovery, token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_overrides() {
        let ext = ExtendedConfig::parse(
            r#"{"tokenEndpoint":"http://127.0.0.1:1/token","scopes":["openid"],"unknown":1}"#,
        );
        assert_eq!(ext.token_endpoint.as_deref(), Some("http://127.0.0.1:1/token"));
        assert_eq!(ext.scopes, Some(vec!["openid".to_string()]));
        assert_eq!(ext.authorization_endpoint, None);
    }

    #[test]
    fn blank_or_broken_ext_means_no_overrides() {
        assert_eq!(ExtendedConfig::parse(""), ExtendedConfig::default());
        assert_eq!(ExtendedConfig::parse("{}"), ExtendedConfig::default());
        assert_eq!(ExtendedConfig::parse("not json"), ExtendedConfig::default());
    }

    #[test]
    fn empty_override_falls_back_to_default() {
        let url = endpoint(Some("  "), "https://github.com/login/oauth/authorize", "endpoint")
            .expect("default parses");
        assert_eq!(url.host_str(), Some("github.com"));
        assert!(endpoint(Some("::nope"), "https://x", "endpoint").is_err());
    }

    #[test]
    fn empty_scope_override_keeps_defaults() {
        let ext = ExtendedConfig {
            scopes: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(ext.scopes_or(&["openid", "email"]), vec!["openid", "email"]);
    }
}
