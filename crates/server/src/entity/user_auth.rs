//! Binding between a local user and one provider identity.
//!
//! `(provider, provider_uid)` is unique system-wide and a user holds at most
//! one binding per provider; both are enforced by unique indexes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Provider families with distinct protocol handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityProvider {
    /// GitHub OAuth2 (REST user endpoint, no ID token)
    GitHub,
    /// Google, an OIDC issuer with a well-known URL
    Google,
    /// Generic OIDC provider (name stored as parameter)
    Oidc(String),
}

impl std::fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityProvider::GitHub => write!(f, "github"),
            IdentityProvider::Google => write!(f, "google"),
            IdentityProvider::Oidc(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for IdentityProvider {
    fn from(s: &str) -> Self {
        match s {
            "github" => IdentityProvider::GitHub,
            "google" => IdentityProvider::Google,
            other => IdentityProvider::Oidc(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_auth")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Reference to users.id
    pub user_id: i32,
    /// Provider key as stored in sso_config.provider
    pub provider: String,
    /// Provider-scoped subject, never the email
    pub provider_uid: String,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_keys_map_to_families() {
        assert_eq!(IdentityProvider::from("github"), IdentityProvider::GitHub);
        assert_eq!(IdentityProvider::from("google"), IdentityProvider::Google);
        assert_eq!(
            IdentityProvider::from("keycloak"),
            IdentityProvider::Oidc("keycloak".into())
        );
        assert_eq!(IdentityProvider::Oidc("authentik".into()).to_string(), "authentik");
    }
}
