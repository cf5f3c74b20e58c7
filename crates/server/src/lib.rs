//! Single-Sign-On federation service.
//!
//! Lets users log in through GitHub, Google or any OpenID Connect issuer,
//! provisions local accounts for first-time logins and binds provider
//! identities to existing accounts.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::sso::SsoService;

pub mod api;
pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod response;
pub mod sso;

#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub sso: Arc<SsoService>,
}

impl AppResources {
    /// Wire the SSO flow with in-process state and session caches.
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Result<Self, reqwest::Error> {
        let sso = Arc::new(SsoService::from_config(db.clone(), &config)?);
        Ok(Self { db, config, sso })
    }
}
