//! Account Reconciler: maps a provider identity onto a local account.
//!
//! With a pending session the identity is bound to that session's account.
//! Without one, an existing binding logs its account in, and an unknown
//! identity gets a freshly provisioned account plus binding.

use crate::entity::{user_auth, users};
use crate::error::{SsoError, is_unique_violation};
use crate::sso::identity::ProviderIdentity;
use crate::sso::password::unusable_password_hash;
use crate::sso::session::SessionStore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernameAvailability {
    Available,
    Taken,
}

/// Successful outcome of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    LoggedIn { user_id: i32, session_token: String },
    Bound { user_id: i32 },
}

#[derive(Clone)]
pub struct AccountReconciler {
    db: Arc<DatabaseConnection>,
    sessions: SessionStore,
    username_attempts: u32,
}

fn creation_error(e: DbErr) -> SsoError {
    if is_unique_violation(&e) {
        tracing::warn!(error = %e, "concurrent account creation lost the race");
    }
    SsoError::AccountCreation(e.to_string())
}

impl AccountReconciler {
    pub fn new(db: Arc<DatabaseConnection>, sessions: SessionStore, username_attempts: u32) -> Self {
        Self {
            db,
            sessions,
            username_attempts,
        }
    }

    #[tracing::instrument(skip(self, identity, pending_session), fields(provider_uid = %identity.provider_uid, bind = pending_session.is_some()))]
    pub async fn reconcile(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
        pending_session: Option<&str>,
    ) -> Result<Reconciliation, SsoError> {
        let binding = self.find_binding(provider, &identity.provider_uid).await?;
        match pending_session {
            Some(token) => self.bind(provider, identity, binding, token).await,
            None => self.login(provider, identity, binding).await,
        }
    }

    pub async fn find_binding(
        &self,
        provider: &str,
        provider_uid: &str,
    ) -> Result<Option<user_auth::Model>, DbErr> {
        user_auth::Entity::find()
            .filter(user_auth::Column::Provider.eq(provider))
            .filter(user_auth::Column::ProviderUid.eq(provider_uid))
            .one(self.db.as_ref())
            .await
    }

    async fn bind(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
        binding: Option<user_auth::Model>,
        session_token: &str,
    ) -> Result<Reconciliation, SsoError> {
        let user = self
            .sessions
            .resolve(session_token)
            .await?
            .filter(users::Model::is_active)
            .ok_or(SsoError::SessionExpiredForBinding)?;

        if let Some(binding) = binding {
            if binding.user_id == user.id {
                return Err(SsoError::AlreadyBound);
            }
            tracing::warn!(user_id = user.id, owner = binding.user_id, "identity bound to another user");
            return Err(SsoError::BindConflict {
                provider: provider.to_string(),
                provider_uid: identity.provider_uid.clone(),
            });
        }

        let linked = user_auth::Entity::find()
            .filter(user_auth::Column::UserId.eq(user.id))
            .filter(user_auth::Column::Provider.eq(provider))
            .one(self.db.as_ref())
            .await?;
        if linked.is_some() {
            return Err(SsoError::ProviderAlreadyLinked(provider.to_string()));
        }

        user_auth::ActiveModel {
            user_id: Set(user.id),
            provider: Set(provider.to_string()),
            provider_uid: Set(identity.provider_uid.clone()),
            created_at: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                SsoError::BindConflict {
                    provider: provider.to_string(),
                    provider_uid: identity.provider_uid.clone(),
                }
            } else {
                SsoError::Database(e)
            }
        })?;

        tracing::info!(user_id = user.id, "bound provider identity");
        Ok(Reconciliation::Bound { user_id: user.id })
    }

    async fn login(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
        binding: Option<user_auth::Model>,
    ) -> Result<Reconciliation, SsoError> {
        let user = match binding {
            Some(binding) => users::Entity::find_by_id(binding.user_id)
                .one(self.db.as_ref())
                .await?
                .filter(users::Model::is_active)
                .ok_or(SsoError::AccountDisabled)?,
            None => self.provision(provider, identity).await?,
        };

        let session_token = self.sessions.issue(&user).await?;
        tracing::info!(user_id = user.id, "SSO login");
        Ok(Reconciliation::LoggedIn {
            user_id: user.id,
            session_token,
        })
    }

    pub async fn username_availability(&self, candidate: &str) -> Result<UsernameAvailability, DbErr> {
        let count = users::Entity::find()
            .filter(users::Column::Username.eq(candidate))
            .count(self.db.as_ref())
            .await?;
        Ok(if count == 0 {
            UsernameAvailability::Available
        } else {
            UsernameAvailability::Taken
        })
    }

    /// First free name among `base`, `base1`, `base2`, ...
    async fn pick_username(&self, base: &str) -> Result<String, SsoError> {
        for attempt in 0..self.username_attempts {
            let candidate = match attempt {
                0 => base.to_string(),
                n => format!("{base}{n}"),
            };
            if self.username_availability(&candidate).await? == UsernameAvailability::Available {
                return Ok(candidate);
            }
        }
        Err(SsoError::UsernameExhausted(base.to_string()))
    }

    /// Create the account and its binding in one transaction.
    async fn provision(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
    ) -> Result<users::Model, SsoError> {
        let base = identity
            .email
            .clone()
            .unwrap_or_else(|| format!("{}@{provider}", identity.provider_uid));
        let username = self.pick_username(&base).await?;
        let name = identity
            .display_name
            .clone()
            .unwrap_or_else(|| username.clone());
        let password =
            unusable_password_hash().map_err(|e| SsoError::AccountCreation(e.to_string()))?;
        let now = OffsetDateTime::now_utc();

        let txn = self.db.begin().await?;
        let user = users::ActiveModel {
            username: Set(username),
            password: Set(password),
            name: Set(name),
            mail: Set(identity.email.clone().unwrap_or_default()),
            status: Set(users::STATUS_ACTIVE),
            role: Set(users::ROLE_USER),
            token: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(creation_error)?;

        user_auth::ActiveModel {
            user_id: Set(user.id),
            provider: Set(provider.to_string()),
            provider_uid: Set(identity.provider_uid.clone()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(creation_error)?;
        txn.commit().await.map_err(creation_error)?;

        tracing::info!(user_id = user.id, username = %user.username, "provisioned account for SSO identity");
        Ok(user)
    }

    pub async fn bindings_of(&self, user_id: i32) -> Result<Vec<user_auth::Model>, DbErr> {
        user_auth::Entity::find()
            .filter(user_auth::Column::UserId.eq(user_id))
            .order_by_asc(user_auth::Column::Id)
            .all(self.db.as_ref())
            .await
    }

    /// Remove the user's binding for `provider`; a missing binding is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn unbind(&self, user_id: i32, provider: &str) -> Result<u64, DbErr> {
        let result = user_auth::Entity::delete_many()
            .filter(user_auth::Column::UserId.eq(user_id))
            .filter(user_auth::Column::Provider.eq(provider))
            .exec(self.db.as_ref())
            .await?;
        tracing::info!(removed = result.rows_affected, "unbound provider");
        Ok(result.rows_affected)
    }
}
