//! OpenID Connect discovery and JWKS retrieval, cached per issuer.

use crate::cache::TtlCache;
use crate::error::SsoError;
use crate::sso::client::OAuthHttp;
use jsonwebtoken::jwk::JwkSet;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// The subset of the discovery document the flow relies on.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    pub jwks_uri: String,
}

#[derive(Clone)]
pub struct OidcDiscovery {
    http: OAuthHttp,
    documents: TtlCache<String, Arc<ProviderMetadata>>,
    key_sets: TtlCache<String, Arc<JwkSet>>,
}

fn normalize_issuer(issuer: &str) -> &str {
    issuer.trim().trim_end_matches('/')
}

impl OidcDiscovery {
    pub fn new(http: OAuthHttp, cache_ttl: Duration) -> Self {
        Self {
            http,
            documents: TtlCache::new(cache_ttl),
            key_sets: TtlCache::new(cache_ttl),
        }
    }

    /// Fetch (or reuse) the discovery document of `issuer`.
    #[tracing::instrument(skip(self))]
    pub async fn discover(&self, issuer: &str) -> Result<Arc<ProviderMetadata>, SsoError> {
        let issuer = normalize_issuer(issuer);
        if issuer.is_empty() {
            return Err(SsoError::OidcDiscovery("issuer URL is not configured".into()));
        }
        if let Some(metadata) = self.documents.get(&issuer.to_string()) {
            return Ok(metadata);
        }

        let url = format!("{issuer}/.well-known/openid-configuration");
        let response = self
            .http
            .http()
            .get(&url)
            .send()
            .await
            .map_err(|e| SsoError::OidcDiscovery(format!("HTTP error: {e}")))?;
        if !response.status().is_success() {
            return Err(SsoError::OidcDiscovery(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| SsoError::OidcDiscovery(format!("JSON parse error: {e}")))?;

        if normalize_issuer(&metadata.issuer) != issuer {
            return Err(SsoError::OidcDiscovery(format!(
                "issuer did not match: expected {issuer}, got {}",
                metadata.issuer
            )));
        }

        tracing::debug!(issuer, "discovered OIDC provider");
        let metadata = Arc::new(metadata);
        self.documents.insert(issuer.to_string(), metadata.clone());
        Ok(metadata)
    }

    /// Fetch the signing keys at `jwks_uri`; `refresh` bypasses the cache.
    #[tracing::instrument(skip(self))]
    pub async fn key_set(&self, jwks_uri: &str, refresh: bool) -> Result<Arc<JwkSet>, SsoError> {
        if !refresh {
            if let Some(keys) = self.key_sets.get(&jwks_uri.to_string()) {
                return Ok(keys);
            }
        }

        let response = self
            .http
            .http()
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| SsoError::IdentityResolution(format!("failed to fetch JWKS: {e}")))?;
        if !response.status().is_success() {
            return Err(SsoError::IdentityResolution(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }
        let keys: JwkSet = response
            .json()
            .await
            .map_err(|e| SsoError::IdentityResolution(format!("failed to parse JWKS: {e}")))?;

        let keys = Arc::new(keys);
        self.key_sets.insert(jwks_uri.to_string(), keys.clone());
        Ok(keys)
    }
}
