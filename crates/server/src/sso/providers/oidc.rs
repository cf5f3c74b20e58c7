use super::{ExtendedConfig, endpoint};
use crate::error::SsoError;
use crate::sso::client::{OAuthHttp, TokenResponse};
use crate::sso::discovery::OidcDiscovery;
use crate::sso::identity::ProviderIdentity;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use url::Url;

pub const GOOGLE_ISSUER: &str = "https://accounts.google.com";
/// Google also signs ID tokens with its issuer written without a scheme.
const GOOGLE_ISSUER_BARE: &str = "accounts.google.com";
pub const SCOPES: &[&str] = &["openid", "profile", "email"];

/// Clock skew tolerated on `exp`, `nbf` and `iat`.
const LEEWAY_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct OidcProvider {
    /// Issuer as announced by the discovery document
    pub issuer: String,
    pub client_id: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Option<Url>,
    pub jwks_uri: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoClaims {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn verify_error(e: impl std::fmt::Display) -> SsoError {
    SsoError::IdentityResolution(format!("failed to verify ID token: {e}"))
}

fn find_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => keys.find(kid),
        None if keys.keys.len() == 1 => keys.keys.first(),
        None => None,
    }
}

impl OidcProvider {
    /// Build the provider from `issuer_url`'s discovery document, applying `ext` overrides.
    pub async fn discover(
        discovery: &OidcDiscovery,
        issuer_url: &str,
        client_id: &str,
        ext: &ExtendedConfig,
    ) -> Result<Self, SsoError> {
        let metadata = discovery.discover(issuer_url).await?;

        let userinfo_endpoint = ext
            .user_info_endpoint
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(metadata.userinfo_endpoint.as_deref())
            .map(|raw| endpoint(None, raw, "userinfo endpoint"))
            .transpose()
            .map_err(SsoError::OidcDiscovery)?;

        Ok(Self {
            issuer: metadata.issuer.clone(),
            client_id: client_id.to_string(),
            authorization_endpoint: endpoint(
                ext.authorization_endpoint.as_deref(),
                &metadata.authorization_endpoint,
                "authorization endpoint",
            )
            .map_err(SsoError::OidcDiscovery)?,
            token_endpoint: endpoint(
                ext.token_endpoint.as_deref(),
                &metadata.token_endpoint,
                "token endpoint",
            )
            .map_err(SsoError::OidcDiscovery)?,
            userinfo_endpoint,
            jwks_uri: metadata.jwks_uri.clone(),
            scopes: ext.scopes_or(SCOPES),
        })
    }

    #[tracing::instrument(skip(self, http, discovery, token), fields(issuer = %self.issuer))]
    pub async fn resolve_identity(
        &self,
        http: &OAuthHttp,
        discovery: &OidcDiscovery,
        token: &TokenResponse,
    ) -> Result<ProviderIdentity, SsoError> {
        if let Some(id_token) = token.id_token.as_deref() {
            let claims = self.verify_id_token(discovery, id_token).await?;
            return Ok(ProviderIdentity {
                provider_uid: claims.sub,
                email: non_empty(claims.email),
                display_name: non_empty(claims.name).or_else(|| non_empty(claims.preferred_username)),
            });
        }

        tracing::debug!("no ID token in response, querying userinfo");
        let claims = self.user_info(http, &token.access_token).await?;
        Ok(ProviderIdentity {
            provider_uid: claims.sub,
            email: non_empty(claims.email),
            display_name: non_empty(claims.name).or_else(|| non_empty(claims.preferred_username)),
        })
    }

    async fn verify_id_token(
        &self,
        discovery: &OidcDiscovery,
        id_token: &str,
    ) -> Result<IdTokenClaims, SsoError> {
        let header = decode_header(id_token).map_err(verify_error)?;
        if matches!(
            header.alg,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(verify_error(format!(
                "symmetric algorithm {:?} not accepted",
                header.alg
            )));
        }

        let kid = header.kid.as_deref();
        let keys = discovery.key_set(&self.jwks_uri, false).await?;
        let jwk = match find_key(&keys, kid) {
            Some(jwk) => jwk.clone(),
            None => {
                // key rotation
                tracing::debug!(kid, "unknown key id, refetching JWKS");
                let keys = discovery.key_set(&self.jwks_uri, true).await?;
                find_key(&keys, kid)
                    .cloned()
                    .ok_or_else(|| verify_error(format!("no key matching kid {kid:?}")))?
            }
        };

        let key = DecodingKey::from_jwk(&jwk).map_err(verify_error)?;
        let mut validation = Validation::new(header.alg);
        if self.issuer == GOOGLE_ISSUER {
            validation.set_issuer(&[GOOGLE_ISSUER, GOOGLE_ISSUER_BARE]);
        } else {
            validation.set_issuer(&[self.issuer.as_str()]);
        }
        validation.set_audience(&[self.client_id.as_str()]);
        validation.leeway = LEEWAY_SECS;

        let data = decode::<IdTokenClaims>(id_token, &key, &validation).map_err(verify_error)?;
        Ok(data.claims)
    }

    async fn user_info(&self, http: &OAuthHttp, access_token: &str) -> Result<UserInfoClaims, SsoError> {
        let endpoint = self.userinfo_endpoint.clone().ok_or_else(|| {
            SsoError::IdentityResolution("provider announces no userinfo endpoint".into())
        })?;

        let response = http
            .http()
            .get(endpoint)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| SsoError::IdentityResolution(format!("userinfo request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SsoError::IdentityResolution(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| SsoError::IdentityResolution(format!("invalid userinfo response: {e}")))
    }
}
