//! Identity resolution: who did the provider just authenticate?

use crate::error::SsoError;
use crate::sso::client::{OAuthHttp, TokenResponse};
use crate::sso::discovery::OidcDiscovery;
use crate::sso::providers::ProviderStrategy;

/// The provider's view of the user, as far as the reconciler cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    /// Stable provider-scoped subject. Never the email.
    pub provider_uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Clone)]
pub struct IdentityResolver {
    http: OAuthHttp,
    discovery: OidcDiscovery,
}

impl IdentityResolver {
    pub fn new(http: OAuthHttp, discovery: OidcDiscovery) -> Self {
        Self { http, discovery }
    }

    #[tracing::instrument(skip(self, strategy, token))]
    pub async fn resolve(
        &self,
        provider: &str,
        strategy: &ProviderStrategy,
        token: &TokenResponse,
    ) -> Result<ProviderIdentity, SsoError> {
        let mut identity = strategy
            .resolve_identity(&self.http, &self.discovery, token)
            .await?;

        identity.provider_uid = identity.provider_uid.trim().to_string();
        if identity.provider_uid.is_empty() {
            tracing::warn!(provider, "provider returned no subject");
            return Err(SsoError::IdentityNotResolved);
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sso::providers::{ExtendedConfig, github::GitHubProvider};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver() -> IdentityResolver {
        let http = OAuthHttp::new(Duration::from_secs(5)).expect("client");
        IdentityResolver::new(http.clone(), OidcDiscovery::new(http, Duration::from_secs(60)))
    }

    fn github(server: &MockServer) -> ProviderStrategy {
        ProviderStrategy::GitHub(
            GitHubProvider::new(&ExtendedConfig {
                user_info_endpoint: Some(format!("{}/user", server.uri())),
                emails_endpoint: Some(format!("{}/user/emails", server.uri())),
                ..Default::default()
            })
            .expect("provider"),
        )
    }

    fn token() -> TokenResponse {
        TokenResponse {
            access_token: "T".into(),
            token_type: None,
            refresh_token: None,
            id_token: None,
            scope: None,
        }
    }

    #[tokio::test]
    async fn missing_subject_is_not_resolved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "login": "ghost", "email": "ghost@example.org"
            })))
            .mount(&server)
            .await;

        let err = resolver()
            .resolve("github", &github(&server), &token())
            .await
            .expect_err("no id");
        assert!(matches!(err, SsoError::IdentityNotResolved));
    }

    #[tokio::test]
    async fn subject_is_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1001, "email": "a@example.org"
            })))
            .mount(&server)
            .await;

        let identity = resolver()
            .resolve("github", &github(&server), &token())
            .await
            .expect("identity");
        assert_eq!(identity.provider_uid, "1001");
        assert_eq!(identity.email.as_deref(), Some("a@example.org"));
    }
}
