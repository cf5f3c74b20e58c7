//! Opaque session tokens handed to the frontend after a successful login.
//!
//! A session token maps onto the user's persistent login secret (`users.token`).
//! The mapping lives in an [`ExpiringStore`]; the secret survives restarts.

use crate::cache::ExpiringStore;
use crate::entity::users;
use crate::sso::password::random_code;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use time::OffsetDateTime;

const SECRET_LENGTH: usize = 32;

#[derive(Clone)]
pub struct SessionStore {
    db: Arc<DatabaseConnection>,
    sessions: Arc<dyn ExpiringStore<String>>,
}

fn session_token(user_id: i32) -> String {
    let digest = Sha256::digest(format!("userId{user_id}").as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{}-{hex}", uuid::Uuid::new_v4())
}

impl SessionStore {
    pub fn new(db: Arc<DatabaseConnection>, sessions: Arc<dyn ExpiringStore<String>>) -> Self {
        Self { db, sessions }
    }

    /// Issue a fresh session token for `user`, creating the login secret on first use.
    #[tracing::instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn issue(&self, user: &users::Model) -> Result<String, DbErr> {
        let secret = match user.token.as_deref().filter(|t| !t.is_empty()) {
            Some(secret) => secret.to_string(),
            None => self.ensure_secret(user.id).await?,
        };

        let token = session_token(user.id);
        self.sessions.set(token.clone(), secret);
        Ok(token)
    }

    /// Store a login secret unless one exists already, and return the stored one.
    ///
    /// Concurrent first logins must all end up with the same secret.
    async fn ensure_secret(&self, user_id: i32) -> Result<String, DbErr> {
        users::Entity::update_many()
            .col_expr(users::Column::Token, Expr::value(random_code(SECRET_LENGTH)))
            .col_expr(users::Column::UpdatedAt, Expr::value(OffsetDateTime::now_utc()))
            .filter(users::Column::Id.eq(user_id))
            .filter(
                Condition::any()
                    .add(users::Column::Token.is_null())
                    .add(users::Column::Token.eq("")),
            )
            .exec(self.db.as_ref())
            .await?;

        users::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .and_then(|u| u.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DbErr::RecordNotFound(format!("login secret of user {user_id}")))
    }

    /// The user a session token belongs to, if the session is still alive.
    pub async fn resolve(&self, token: &str) -> Result<Option<users::Model>, DbErr> {
        let Some(secret) = self.sessions.get(token) else {
            return Ok(None);
        };
        users::Entity::find()
            .filter(users::Column::Token.eq(secret))
            .one(self.db.as_ref())
            .await
    }

    pub fn revoke(&self, token: &str) {
        self.sessions.delete(token);
    }
}
