//! SSO provider configuration, one row per provider key.

use super::user_auth::IdentityProvider;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sso_config")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Stable key: "github", "google" or any name of a generic OIDC issuer
    #[sea_orm(unique)]
    pub provider: String,
    pub enabled: bool,
    /// Label shown on the login page
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    /// Required for generic OIDC providers
    pub issuer_url: String,
    /// Reserved for SAML; no flow reads it.
    #[sea_orm(column_type = "Text")]
    pub saml_metadata: String,
    /// Provider specific extras as a JSON object
    #[sea_orm(column_type = "Text")]
    pub ext: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Model {
    pub fn provider_type(&self) -> IdentityProvider {
        IdentityProvider::from(self.provider.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
