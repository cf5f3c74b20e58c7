//! Flow Controller: the public and authenticated SSO operations.

use crate::cache::{ExpiringStore, TtlCache};
use crate::config::{AppConfig, SsoSettings};
use crate::entity::users;
use crate::error::SsoError;
use crate::sso::client::OAuthHttp;
use crate::sso::discovery::OidcDiscovery;
use crate::sso::identity::IdentityResolver;
use crate::sso::reconcile::{AccountReconciler, Reconciliation};
use crate::sso::registry::{ProviderRegistry, ResolvedProvider};
use crate::sso::session::SessionStore;
use crate::sso::state::{PendingLogin, StateStore};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use utoipa::ToSchema;

pub const BIND_SUCCESS: &str = "Bind success";

/// Enabled provider as shown on the login page.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProviderSummary {
    /// Provider key used in login and callback URLs
    pub provider: String,
    /// Display label
    pub name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BindingSummary {
    pub provider: String,
    pub provider_uid: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// What the frontend login route receives after a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    /// `ssoToken`: the login succeeded
    SessionToken(String),
    /// `ssoError`: a failure or a bind outcome, human readable
    Notice(String),
}

#[derive(Clone)]
pub struct SsoService {
    registry: ProviderRegistry,
    states: StateStore,
    http: OAuthHttp,
    identities: IdentityResolver,
    reconciler: AccountReconciler,
    sessions: SessionStore,
    settings: SsoSettings,
}

impl SsoService {
    /// Wire the flow with injected state and session stores.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        states: Arc<dyn ExpiringStore<PendingLogin>>,
        sessions: Arc<dyn ExpiringStore<String>>,
    ) -> Result<Self, reqwest::Error> {
        let settings = config.sso.clone();
        let http = OAuthHttp::new(settings.http_timeout())?;
        let discovery = OidcDiscovery::new(http.clone(), settings.discovery_cache_ttl());
        let sessions = SessionStore::new(db.clone(), sessions);

        Ok(Self {
            registry: ProviderRegistry::new(
                db.clone(),
                discovery.clone(),
                config.api_prefix.clone(),
            ),
            states: StateStore::new(states),
            identities: IdentityResolver::new(http.clone(), discovery),
            reconciler: AccountReconciler::new(db, sessions.clone(), settings.username_attempts),
            http,
            sessions,
            settings,
        })
    }

    /// Wire the flow with in-process TTL caches.
    pub fn from_config(db: Arc<DatabaseConnection>, config: &AppConfig) -> Result<Self, reqwest::Error> {
        let states = Arc::new(TtlCache::<String, PendingLogin>::new(config.sso.state_ttl()));
        let sessions = Arc::new(TtlCache::<String, String>::new(config.sso.session_ttl()));
        Self::new(db, config, states, sessions)
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_providers(&self) -> Result<Vec<ProviderSummary>, SsoError> {
        Ok(self
            .registry
            .list_enabled()
            .await?
            .into_iter()
            .map(|c| ProviderSummary {
                provider: c.provider,
                name: c.name,
            })
            .collect())
    }

    /// Authorization URL to send the browser to.
    ///
    /// `current_token` is the caller's session when they want to bind the
    /// provider to their account instead of logging in.
    #[tracing::instrument(skip(self, current_token))]
    pub async fn start_login(
        &self,
        provider: &str,
        origin: &str,
        current_token: Option<String>,
    ) -> Result<String, SsoError> {
        let resolved = self.registry.resolve(provider, origin).await?;
        let state = self.states.issue(provider, current_token);
        Ok(self.http.authorization_url(&resolved.client, &state))
    }

    /// Run the callback leg of the flow.
    ///
    /// Errors are the cases answered directly instead of through the frontend:
    /// a malformed request or unknown state (400) and an unresolvable provider
    /// configuration (500). Everything after that is a [`CallbackResult`].
    #[tracing::instrument(skip(self, code, state))]
    pub async fn handle_callback(
        &self,
        provider: &str,
        code: Option<&str>,
        state: Option<&str>,
        origin: &str,
    ) -> Result<CallbackResult, SsoError> {
        let (Some(code), Some(state)) = (
            code.filter(|c| !c.is_empty()),
            state.filter(|s| !s.is_empty()),
        ) else {
            return Err(SsoError::MalformedCallbackRequest);
        };

        let pending = self
            .states
            .consume(provider, state)
            .ok_or(SsoError::InvalidOrExpiredState)?;
        let resolved = self.registry.resolve(provider, origin).await?;

        Ok(match self.complete(provider, &resolved, code, &pending).await {
            Ok(Reconciliation::LoggedIn { session_token, .. }) => {
                CallbackResult::SessionToken(session_token)
            }
            Ok(Reconciliation::Bound { .. }) => CallbackResult::Notice(BIND_SUCCESS.to_string()),
            Err(e) => {
                match &e {
                    SsoError::AlreadyBound => tracing::info!("identity already bound"),
                    SsoError::Database(_) | SsoError::AccountCreation(_) => {
                        tracing::error!(error = %e, "SSO callback failed")
                    }
                    _ => tracing::warn!(error = %e, "SSO callback failed"),
                }
                CallbackResult::Notice(e.user_message())
            }
        })
    }

    async fn complete(
        &self,
        provider: &str,
        resolved: &ResolvedProvider,
        code: &str,
        pending: &PendingLogin,
    ) -> Result<Reconciliation, SsoError> {
        let token = self.http.exchange_code(&resolved.client, code).await?;
        let identity = self
            .identities
            .resolve(provider, &resolved.strategy, &token)
            .await?;
        self.reconciler
            .reconcile(provider, &identity, pending.bind_session.as_deref())
            .await
    }

    /// Frontend login route carrying the outcome, e.g. `https://host/#/login?ssoToken=...`.
    pub fn frontend_redirect(&self, origin: &str, result: &CallbackResult) -> String {
        let (key, value) = match result {
            CallbackResult::SessionToken(token) => ("ssoToken", token.as_str()),
            CallbackResult::Notice(message) => ("ssoError", message.as_str()),
        };
        format!(
            "{}{}?{key}={}",
            origin.trim_end_matches('/'),
            self.settings.frontend_login_route,
            urlencoding::encode(value)
        )
    }

    #[tracing::instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn list_bindings(&self, user: &users::Model) -> Result<Vec<BindingSummary>, SsoError> {
        Ok(self
            .reconciler
            .bindings_of(user.id)
            .await?
            .into_iter()
            .map(|b| BindingSummary {
                provider: b.provider,
                provider_uid: b.provider_uid,
                created_at: b.created_at,
            })
            .collect())
    }

    #[tracing::instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn unbind(&self, user: &users::Model, provider: &str) -> Result<(), SsoError> {
        self.reconciler.unbind(user.id, provider).await?;
        Ok(())
    }
}
