use super::{ExtendedConfig, endpoint};
use crate::error::SsoError;
use crate::sso::client::OAuthHttp;
use crate::sso::identity::ProviderIdentity;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use url::Url;

pub const AUTHORIZATION_ENDPOINT: &str = "https://github.com/login/oauth/authorize";
pub const TOKEN_ENDPOINT: &str = "https://github.com/login/oauth/access_token";
pub const USER_ENDPOINT: &str = "https://api.github.com/user";
pub const EMAILS_ENDPOINT: &str = "https://api.github.com/user/emails";
pub const SCOPES: &[&str] = &["read:user", "user:email"];

const GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Clone)]
pub struct GitHubProvider {
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub user_endpoint: Url,
    pub emails_endpoint: Url,
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    #[serde(default)]
    id: Option<serde_json::Number>,
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// GitHub ids are integers; a float rendering would carry an exponent.
fn render_id(id: &serde_json::Number) -> String {
    match (id.as_u64(), id.as_i64(), id.as_f64()) {
        (Some(v), _, _) => v.to_string(),
        (_, Some(v), _) => v.to_string(),
        (_, _, Some(v)) => format!("{v:.0}"),
        _ => id.to_string(),
    }
}

impl GitHubProvider {
    pub fn new(ext: &ExtendedConfig) -> Result<Self, SsoError> {
        Self::with_overrides(ext).map_err(|e| {
            tracing::warn!(error = %e, "malformed GitHub endpoint override");
            SsoError::InvalidProviderConfig(e)
        })
    }

    fn with_overrides(ext: &ExtendedConfig) -> Result<Self, String> {
        Ok(Self {
            authorization_endpoint: endpoint(
                ext.authorization_endpoint.as_deref(),
                AUTHORIZATION_ENDPOINT,
                "authorization endpoint",
            )?,
            token_endpoint: endpoint(
                ext.token_endpoint.as_deref(),
                TOKEN_ENDPOINT,
                "token endpoint",
            )?,
            user_endpoint: endpoint(
                ext.user_info_endpoint.as_deref(),
                USER_ENDPOINT,
                "user endpoint",
            )?,
            emails_endpoint: endpoint(
                ext.emails_endpoint.as_deref(),
                EMAILS_ENDPOINT,
                "emails endpoint",
            )?,
            scopes: ext.scopes_or(SCOPES),
        })
    }

    #[tracing::instrument(skip(self, http, access_token), fields(user_endpoint = %self.user_endpoint))]
    pub async fn resolve_identity(
        &self,
        http: &OAuthHttp,
        access_token: &str,
    ) -> Result<ProviderIdentity, SsoError> {
        let response = http
            .http()
            .get(self.user_endpoint.clone())
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .header(ACCEPT, GITHUB_JSON)
            .send()
            .await
            .map_err(|e| SsoError::IdentityResolution(format!("GitHub user request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SsoError::IdentityResolution(format!(
                "GitHub user endpoint returned {}",
                response.status()
            )));
        }
        let user: GitHubUser = response
            .json()
            .await
            .map_err(|e| SsoError::IdentityResolution(format!("invalid GitHub user: {e}")))?;

        let provider_uid = user.id.as_ref().map(render_id).unwrap_or_default();
        let email = match non_empty(user.email) {
            Some(email) => Some(email),
            None => self.primary_email(http, access_token).await,
        };

        Ok(ProviderIdentity {
            provider_uid,
            email,
            display_name: non_empty(user.name).or_else(|| non_empty(user.login)),
        })
    }

    /// Primary verified address from the emails endpoint; failures only log.
    async fn primary_email(&self, http: &OAuthHttp, access_token: &str) -> Option<String> {
        let response = http
            .http()
            .get(self.emails_endpoint.clone())
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .header(ACCEPT, GITHUB_JSON)
            .send()
            .await;

        let emails: Vec<GitHubEmail> = match response {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(emails) => emails,
                Err(e) => {
                    tracing::warn!(error = %e, "invalid GitHub emails response");
                    return None;
                }
            },
            Ok(r) => {
                tracing::debug!(status = %r.status(), "GitHub emails endpoint unavailable");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "GitHub emails request failed");
                return None;
            }
        };

        emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .and_then(|e| non_empty(Some(e.email)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GitHubProvider {
        GitHubProvider::new(&ExtendedConfig {
            user_info_endpoint: Some(format!("{}/user", server.uri())),
            emails_endpoint: Some(format!("{}/user/emails", server.uri())),
            ..Default::default()
        })
        .expect("provider")
    }

    fn http() -> OAuthHttp {
        OAuthHttp::new(Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn defaults_point_at_github() {
        let p = GitHubProvider::new(&ExtendedConfig::default()).expect("provider");
        assert_eq!(p.authorization_endpoint.as_str(), AUTHORIZATION_ENDPOINT);
        assert_eq!(p.token_endpoint.as_str(), TOKEN_ENDPOINT);
        assert_eq!(p.scopes, vec!["read:user", "user:email"]);
    }

    #[test]
    fn malformed_override_is_a_configuration_error() {
        let ext = ExtendedConfig {
            token_endpoint: Some("not a url".into()),
            ..Default::default()
        };
        let err = GitHubProvider::new(&ext).expect_err("malformed");
        assert!(matches!(err, SsoError::InvalidProviderConfig(ref m) if m.contains("token endpoint")));
        assert_eq!(err.user_message(), "invalid provider configuration");
    }

    #[test]
    fn numeric_ids_render_without_fraction() {
        let n: serde_json::Number = serde_json::from_str("583231").expect("number");
        assert_eq!(render_id(&n), "583231");
        let n: serde_json::Number = serde_json::from_str("583231.0").expect("number");
        assert_eq!(render_id(&n), "583231");
    }

    #[tokio::test]
    async fn resolves_public_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer T"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 42, "login": "octo", "name": "Octo Cat", "email": "octo@example.org"
            })))
            .mount(&server)
            .await;

        let identity = provider(&server)
            .resolve_identity(&http(), "T")
            .await
            .expect("identity");
        assert_eq!(identity.provider_uid, "42");
        assert_eq!(identity.email.as_deref(), Some("octo@example.org"));
        assert_eq!(identity.display_name.as_deref(), Some("Octo Cat"));
    }

    #[tokio::test]
    async fn falls_back_to_primary_verified_email() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 7, "login": "hidden", "name": null, "email": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "email": "old@example.org", "primary": false, "verified": true },
                { "email": "main@example.org", "primary": true, "verified": true }
            ])))
            .mount(&server)
            .await;

        let identity = provider(&server)
            .resolve_identity(&http(), "T")
            .await
            .expect("identity");
        assert_eq!(identity.email.as_deref(), Some("main@example.org"));
        assert_eq!(identity.display_name.as_deref(), Some("hidden"));
    }

    #[tokio::test]
    async fn emails_failure_is_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": 7 })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/emails"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let identity = provider(&server)
            .resolve_identity(&http(), "T")
            .await
            .expect("identity");
        assert_eq!(identity.provider_uid, "7");
        assert_eq!(identity.email, None);
    }

    #[tokio::test]
    async fn user_endpoint_error_is_resolution_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = provider(&server)
            .resolve_identity(&http(), "T")
            .await
            .expect_err("must fail");
        assert!(matches!(err, SsoError::IdentityResolution(_)));
    }
}
