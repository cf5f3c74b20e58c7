//! OAuth2 Authorization Code client: authorization URLs and code exchange.

use crate::error::SsoError;
use reqwest::{Client, header::ACCEPT};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Everything needed to drive the Authorization Code flow against one provider.
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

// GitHub answers token errors with 200 and an `error` field.
#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    refresh_token: Option<String>,
    id_token: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Shared outbound HTTP client for all provider calls.
#[derive(Clone)]
pub struct OAuthHttp {
    http: Client,
}

impl OAuthHttp {
    /// Every request made through this client is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("sso-federation/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Build the provider authorization URL carrying `state`.
    pub fn authorization_url(&self, config: &OAuthClientConfig, state: &str) -> String {
        let mut url = config.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &config.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("access_type", "offline");
        url.to_string()
    }

    /// Exchange an authorization code at the token endpoint.
    #[tracing::instrument(skip(self, config, code), fields(token_endpoint = %config.token_endpoint))]
    pub async fn exchange_code(
        &self,
        config: &OAuthClientConfig,
        code: &str,
    ) -> Result<TokenResponse, SsoError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(config.token_endpoint.clone())
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| SsoError::TokenExchange(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SsoError::TokenExchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let raw: RawTokenResponse = response
            .json()
            .await
            .map_err(|e| SsoError::TokenExchange(format!("invalid token response: {e}")))?;

        if let Some(error) = raw.error {
            return Err(SsoError::TokenExchange(match raw.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            }));
        }

        let access_token = raw
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SsoError::TokenExchange("response carried no access_token".into()))?;

        Ok(TokenResponse {
            access_token,
            token_type: raw.token_type,
            refresh_token: raw.refresh_token,
            id_token: raw.id_token.filter(|t| !t.is_empty()),
            scope: raw.scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(token_endpoint: &str) -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: "client-1".into(),
            client_secret: "secret-1".into(),
            authorization_endpoint: Url::parse("https://idp.example.org/authorize?prompt=consent")
                .expect("url"),
            token_endpoint: Url::parse(token_endpoint).expect("url"),
            redirect_uri: "https://panel.example.org/api/system/sso/callback/github".into(),
            scopes: vec!["read:user".into(), "user:email".into()],
        }
    }

    fn client() -> OAuthHttp {
        OAuthHttp::new(Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn authorization_url_carries_flow_parameters() {
        let url = client().authorization_url(&config("https://idp.example.org/token"), "S1");
        let parsed = Url::parse(&url).expect("valid url");
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("prompt"), Some("consent"));
        assert_eq!(get("client_id"), Some("client-1"));
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("scope"), Some("read:user user:email"));
        assert_eq!(get("state"), Some("S1"));
        assert_eq!(get("access_type"), Some("offline"));
        assert_eq!(
            get("redirect_uri"),
            Some("https://panel.example.org/api/system/sso/callback/github")
        );
    }

    #[tokio::test]
    async fn exchange_returns_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("accept", "application/json"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "T",
                "token_type": "bearer",
                "id_token": "header.payload.sig"
            })))
            .mount(&server)
            .await;

        let token = client()
            .exchange_code(&config(&format!("{}/token", server.uri())), "abc")
            .await
            .expect("exchange");
        assert_eq!(token.access_token, "T");
        assert_eq!(token.id_token.as_deref(), Some("header.payload.sig"));
    }

    #[tokio::test]
    async fn exchange_surfaces_error_field_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired."
            })))
            .mount(&server)
            .await;

        let err = client()
            .exchange_code(&config(&format!("{}/token", server.uri())), "stale")
            .await
            .expect_err("must fail");
        assert!(matches!(err, SsoError::TokenExchange(ref m) if m.contains("bad_verification_code")));
    }

    #[tokio::test]
    async fn exchange_fails_on_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let err = client()
            .exchange_code(&config(&format!("{}/token", server.uri())), "abc")
            .await
            .expect_err("must fail");
        assert!(matches!(err, SsoError::TokenExchange(_)));
    }

    #[tokio::test]
    async fn exchange_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "access_token": "T" }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let slow_client = OAuthHttp::new(Duration::from_millis(200)).expect("client");
        let err = slow_client
            .exchange_code(&config(&format!("{}/token", server.uri())), "abc")
            .await
            .expect_err("must time out");
        assert!(matches!(err, SsoError::TokenExchange(_)));
    }
}
