//! Provider configuration management for administrators.

use crate::AppResources;
use crate::api::auth::AdminUser;
use crate::entity::sso_config;
use crate::entity::user_auth::IdentityProvider;
use crate::response::{ApiError, ApiJson, ApiResponse, ApiStatus};
use crate::sso::SSO_CONFIG_TAG;
use crate::sso::providers::ExtendedConfig;
use crate::sso::registry::ProviderConfigUpdate;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

pub fn router(resources: AppResources) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(get_list))
        .routes(routes!(save))
        .with_state(resources)
}

/// Stored provider configuration. The client secret is never echoed back.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigView {
    pub id: i32,
    pub provider: String,
    pub enabled: bool,
    pub name: String,
    pub client_id: String,
    pub has_client_secret: bool,
    pub issuer_url: String,
    pub saml_metadata: String,
    /// JSON overrides (`authorizationEndpoint`, `tokenEndpoint`, `userInfoEndpoint`,
    /// `emailsEndpoint`, `issuerUrl`, `scopes`)
    pub extended_config: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<sso_config::Model> for ProviderConfigView {
    fn from(model: sso_config::Model) -> Self {
        Self {
            id: model.id,
            has_client_secret: !model.client_secret.is_empty(),
            provider: model.provider,
            enabled: model.enabled,
            name: model.name,
            client_id: model.client_id,
            issuer_url: model.issuer_url,
            saml_metadata: model.saml_metadata,
            extended_config: model.ext,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveProviderConfigRequest {
    pub provider: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub client_id: String,
    /// Leave empty to keep the stored secret
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub issuer_url: String,
    #[serde(default)]
    pub saml_metadata: String,
    #[serde(default)]
    pub extended_config: String,
}

impl SaveProviderConfigRequest {
    fn into_update(self) -> Result<ProviderConfigUpdate, ApiError> {
        let provider = self.provider.trim().to_string();
        if provider.is_empty()
            || !provider
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ApiError::param(
                "provider must be non-empty and contain only letters, digits, '-' or '_'",
            ));
        }

        let ext = self.extended_config.trim().to_string();
        if !ext.is_empty() && !serde_json::from_str::<serde_json::Value>(&ext).is_ok_and(|v| v.is_object()) {
            return Err(ApiError::param("extendedConfig must be a JSON object"));
        }

        let issuer_url = self.issuer_url.trim().to_string();
        let generic_oidc = matches!(IdentityProvider::from(provider.as_str()), IdentityProvider::Oidc(_));
        if self.enabled
            && generic_oidc
            && issuer_url.is_empty()
            && ExtendedConfig::parse(&ext).issuer_url.is_none()
        {
            return Err(ApiError::param("issuerUrl is required for OIDC providers"));
        }

        let name = match self.name.trim() {
            "" => provider.clone(),
            name => name.to_string(),
        };

        Ok(ProviderConfigUpdate {
            provider,
            enabled: self.enabled,
            name,
            client_id: self.client_id.trim().to_string(),
            client_secret: self.client_secret,
            issuer_url,
            saml_metadata: self.saml_metadata,
            ext,
        })
    }
}

#[utoipa::path(
    post,
    path = "/ssoConfig/getList",
    tag = SSO_CONFIG_TAG,
    operation_id = "List SSO Provider Configurations",
    summary = "All provider configurations, enabled or not",
    security(("token" = [])),
    responses(
        (status = 200, description = "Provider configurations", body = ApiResponse<Vec<ProviderConfigView>>),
        (status = 401, description = "Not logged in", body = ApiStatus),
        (status = 403, description = "Not an administrator", body = ApiStatus)
    )
)]
#[tracing::instrument(skip(resources, admin), fields(admin_id = admin.id))]
pub async fn get_list(
    State(resources): State<AppResources>,
    AdminUser(admin): AdminUser,
) -> Result<ApiResponse<Vec<ProviderConfigView>>, ApiError> {
    let configs = resources.sso.registry().list_all().await?;
    Ok(ApiResponse::ok(configs.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/ssoConfig/save",
    tag = SSO_CONFIG_TAG,
    operation_id = "Save SSO Provider Configuration",
    summary = "Create or update a provider configuration",
    description = "Creates the configuration for `provider` or updates the existing one. \
                   An empty `clientSecret` keeps the stored secret.",
    security(("token" = [])),
    request_body = SaveProviderConfigRequest,
    responses(
        (status = 200, description = "Saved configuration", body = ApiResponse<ProviderConfigView>),
        (status = 400, description = "Invalid configuration or malformed body", body = ApiStatus),
        (status = 401, description = "Not logged in", body = ApiStatus),
        (status = 403, description = "Not an administrator", body = ApiStatus)
    )
)]
#[tracing::instrument(skip(resources, admin, request), fields(admin_id = admin.id, provider = %request.provider))]
pub async fn save(
    State(resources): State<AppResources>,
    AdminUser(admin): AdminUser,
    ApiJson(request): ApiJson<SaveProviderConfigRequest>,
) -> Result<ApiResponse<ProviderConfigView>, ApiError> {
    let update = request.into_update()?;
    let saved = resources.sso.registry().save(update).await?;
    Ok(ApiResponse::ok(saved.into()))
}
