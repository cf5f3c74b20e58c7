//! Provider Registry: stored provider configuration and its resolution into
//! a ready-to-use OAuth2 client.

use crate::entity::sso_config;
use crate::entity::user_auth::IdentityProvider;
use crate::error::SsoError;
use crate::sso::client::OAuthClientConfig;
use crate::sso::discovery::OidcDiscovery;
use crate::sso::providers::github::GitHubProvider;
use crate::sso::providers::oidc::{GOOGLE_ISSUER, OidcProvider};
use crate::sso::providers::{ExtendedConfig, ProviderStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use std::sync::Arc;
use time::OffsetDateTime;

/// A provider ready to drive one login.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub config: sso_config::Model,
    pub client: OAuthClientConfig,
    pub strategy: ProviderStrategy,
}

/// Create-or-update payload for a provider configuration.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfigUpdate {
    pub provider: String,
    pub enabled: bool,
    pub name: String,
    pub client_id: String,
    /// Empty keeps the stored secret.
    pub client_secret: String,
    pub issuer_url: String,
    pub saml_metadata: String,
    pub ext: String,
}

#[derive(Clone)]
pub struct ProviderRegistry {
    db: Arc<DatabaseConnection>,
    discovery: OidcDiscovery,
    api_prefix: String,
}

impl ProviderRegistry {
    pub fn new(db: Arc<DatabaseConnection>, discovery: OidcDiscovery, api_prefix: String) -> Self {
        Self {
            db,
            discovery,
            api_prefix,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_enabled(&self) -> Result<Vec<sso_config::Model>, DbErr> {
        sso_config::Entity::find()
            .filter(sso_config::Column::Enabled.eq(true))
            .order_by_asc(sso_config::Column::Id)
            .all(self.db.as_ref())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<sso_config::Model>, DbErr> {
        sso_config::Entity::find()
            .order_by_asc(sso_config::Column::Id)
            .all(self.db.as_ref())
            .await
    }

    pub async fn find_enabled(&self, provider: &str) -> Result<sso_config::Model, SsoError> {
        sso_config::Entity::find()
            .filter(sso_config::Column::Provider.eq(provider))
            .filter(sso_config::Column::Enabled.eq(true))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| SsoError::ConfigNotFoundOrDisabled(provider.to_string()))
    }

    /// Callback URI registered with the provider, e.g.
    /// `https://panel.example.org/api/system/sso/callback/github`.
    pub fn redirect_uri(&self, origin: &str, provider: &str) -> String {
        format!(
            "{}{}/system/sso/callback/{}",
            origin.trim_end_matches('/'),
            self.api_prefix,
            urlencoding::encode(provider)
        )
    }

    /// Resolve `provider` into its OAuth2 client and protocol strategy.
    ///
    /// OIDC providers are discovered here, so this may hit the network.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, provider: &str, origin: &str) -> Result<ResolvedProvider, SsoError> {
        let config = self.find_enabled(provider).await?;
        let ext = ExtendedConfig::parse(&config.ext);

        let strategy = match config.provider_type() {
            IdentityProvider::GitHub => ProviderStrategy::GitHub(GitHubProvider::new(&ext)?),
            IdentityProvider::Google => {
                let issuer = ext
                    .issuer_url
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(GOOGLE_ISSUER);
                ProviderStrategy::Oidc(
                    OidcProvider::discover(&self.discovery, issuer, &config.client_id, &ext).await?,
                )
            }
            IdentityProvider::Oidc(_) => {
                let issuer = ext
                    .issuer_url
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(&config.issuer_url);
                ProviderStrategy::Oidc(
                    OidcProvider::discover(&self.discovery, issuer, &config.client_id, &ext).await?,
                )
            }
        };

        let client = OAuthClientConfig {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            authorization_endpoint: strategy.authorization_endpoint().clone(),
            token_endpoint: strategy.token_endpoint().clone(),
            redirect_uri: self.redirect_uri(origin, provider),
            scopes: strategy.scopes().to_vec(),
        };

        Ok(ResolvedProvider {
            config,
            client,
            strategy,
        })
    }

    /// Create or update the configuration keyed by `update.provider`.
    #[tracing::instrument(skip(self, update), fields(provider = %update.provider))]
    pub async fn save(&self, update: ProviderConfigUpdate) -> Result<sso_config::Model, DbErr> {
        let now = OffsetDateTime::now_utc();
        let existing = sso_config::Entity::find()
            .filter(sso_config::Column::Provider.eq(update.provider.as_str()))
            .one(self.db.as_ref())
            .await?;

        match existing {
            Some(existing) => {
                let keep_secret = update.client_secret.is_empty();
                let mut active: sso_config::ActiveModel = existing.into();
                active.enabled = Set(update.enabled);
                active.name = Set(update.name);
                active.client_id = Set(update.client_id);
                if !keep_secret {
                    active.client_secret = Set(update.client_secret);
                }
                active.issuer_url = Set(update.issuer_url);
                active.saml_metadata = Set(update.saml_metadata);
                active.ext = Set(update.ext);
                active.updated_at = Set(now);
                let saved = active.update(self.db.as_ref()).await?;
                tracing::info!("updated SSO provider configuration");
                Ok(saved)
            }
            None => {
                let saved = sso_config::ActiveModel {
                    provider: Set(update.provider),
                    enabled: Set(update.enabled),
                    name: Set(update.name),
                    client_id: Set(update.client_id),
                    client_secret: Set(update.client_secret),
                    issuer_url: Set(update.issuer_url),
                    saml_metadata: Set(update.saml_metadata),
                    ext: Set(update.ext),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(self.db.as_ref())
                .await?;
                tracing::info!("created SSO provider configuration");
                Ok(saved)
            }
        }
    }
}
