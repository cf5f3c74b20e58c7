//! Local user account.
//!
//! Owned by the surrounding user-management system; SSO reads it, creates new
//! accounts for first-time provider logins and sets the persistent login secret.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const STATUS_ACTIVE: i32 = 1;
pub const ROLE_ADMIN: i32 = 1;
pub const ROLE_USER: i32 = 2;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password: String,
    /// Display name
    pub name: String,
    pub mail: String,
    pub status: i32,
    pub role: i32,
    /// Persistent login secret; session tokens map onto it.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Model {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_auth::Entity")]
    Bindings,
}

impl Related<super::user_auth::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bindings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
