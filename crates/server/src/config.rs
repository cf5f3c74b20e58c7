use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Tunables for the SSO flow.
#[derive(Clone, Debug, Deserialize)]
pub struct SsoSettings {
    /// Timeout applied to every outbound provider request.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Lifetime of an issued, not yet consumed, state token.
    #[serde(default = "default_state_ttl_secs")]
    pub state_ttl_secs: u64,
    /// Lifetime of an opaque session token handed to the frontend.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// How long discovery documents and JWKS are reused per issuer.
    #[serde(default = "default_discovery_cache_ttl_secs")]
    pub discovery_cache_ttl_secs: u64,
    /// Username candidates tried before account creation gives up.
    #[serde(default = "default_username_attempts")]
    pub username_attempts: u32,
    /// Frontend route receiving `ssoToken` / `ssoError`.
    #[serde(default = "default_frontend_login_route")]
    pub frontend_login_route: String,
}

impl SsoSettings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn discovery_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.discovery_cache_ttl_secs)
    }
}

impl Default for SsoSettings {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout_secs(),
            state_ttl_secs: default_state_ttl_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            discovery_cache_ttl_secs: default_discovery_cache_ttl_secs(),
            username_attempts: default_username_attempts(),
            frontend_login_route: default_frontend_login_route(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Externally visible origin, e.g. `https://panel.example.org`.
    /// When unset the origin is derived from the request's Host header.
    #[serde(default)]
    pub public_url: Option<String>,
    /// Path prefix under which the API router is mounted.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default)]
    pub sso: SsoSettings,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_http_timeout_secs() -> u64 {
    15
}

fn default_state_ttl_secs() -> u64 {
    600
}

fn default_session_ttl_secs() -> u64 {
    86400 * 7
}

fn default_discovery_cache_ttl_secs() -> u64 {
    3600
}

fn default_username_attempts() -> u32 {
    10
}

fn default_frontend_login_route() -> String {
    "/#/login".to_string()
}

impl AppConfig {
    /// Check invariants the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Validation("database_url must be set".into()));
        }
        if !self.api_prefix.is_empty()
            && (!self.api_prefix.starts_with('/') || self.api_prefix.ends_with('/'))
        {
            return Err(ConfigError::Validation(
                "api_prefix must start with '/' and must not end with '/'".into(),
            ));
        }
        if let Some(public_url) = &self.public_url {
            let parsed = url::Url::parse(public_url)
                .map_err(|e| ConfigError::Validation(format!("public_url is invalid: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Validation(
                    "public_url must use http or https".into(),
                ));
            }
        }
        if self.sso.http_timeout_secs == 0 || self.sso.http_timeout_secs > 120 {
            return Err(ConfigError::Validation(
                "sso.http_timeout_secs must be between 1 and 120".into(),
            ));
        }
        if self.sso.state_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "sso.state_ttl_secs must be > 0".into(),
            ));
        }
        if self.sso.session_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "sso.session_ttl_secs must be > 0".into(),
            ));
        }
        if self.sso.username_attempts == 0 {
            return Err(ConfigError::Validation(
                "sso.username_attempts must be > 0".into(),
            ));
        }
        if !self.sso.frontend_login_route.starts_with('/') {
            return Err(ConfigError::Validation(
                "sso.frontend_login_route must start with '/'".into(),
            ));
        }
        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any variable matching the key path separated by double underscores
/// (e.g. `SSO__HTTP_TIMEOUT_SECS`) overrides the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;

    Ok(app)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
