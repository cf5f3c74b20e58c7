use sea_orm::DbErr;
use thiserror::Error;

/// Every failure the SSO flow can produce.
///
/// The `Display` text is meant for logs. What the browser sees is
/// [`SsoError::user_message`], which never carries transport or database detail.
#[derive(Debug, Error)]
pub enum SsoError {
    #[error("provider not found or disabled: {0}")]
    ConfigNotFoundOrDisabled(String),
    #[error("invalid provider configuration: {0}")]
    InvalidProviderConfig(String),
    #[error("OIDC discovery failed: {0}")]
    OidcDiscovery(String),
    #[error("missing code or state")]
    MalformedCallbackRequest,
    #[error("invalid or expired state")]
    InvalidOrExpiredState,
    #[error("failed to exchange token: {0}")]
    TokenExchange(String),
    #[error("failed to resolve identity: {0}")]
    IdentityResolution(String),
    #[error("could not identify user from provider")]
    IdentityNotResolved,
    #[error("session expired before binding")]
    SessionExpiredForBinding,
    #[error("identity {provider}/{provider_uid} is already bound to another user")]
    BindConflict {
        provider: String,
        provider_uid: String,
    },
    #[error("user already has a {0} identity bound")]
    ProviderAlreadyLinked(String),
    #[error("identity already bound to this user")]
    AlreadyBound,
    #[error("account is disabled or does not exist")]
    AccountDisabled,
    #[error("no free username derived from {0}")]
    UsernameExhausted(String),
    #[error("failed to create account: {0}")]
    AccountCreation(String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl SsoError {
    /// Human readable text for the frontend's `ssoError` parameter.
    pub fn user_message(&self) -> String {
        match self {
            SsoError::ConfigNotFoundOrDisabled(_) => "provider not found or disabled".to_string(),
            SsoError::InvalidProviderConfig(_) => "invalid provider configuration".to_string(),
            SsoError::OidcDiscovery(_) => "failed to init OIDC provider".to_string(),
            SsoError::MalformedCallbackRequest => "Missing code or state".to_string(),
            SsoError::InvalidOrExpiredState => "Invalid or expired state".to_string(),
            SsoError::TokenExchange(_) => "Failed to exchange token".to_string(),
            SsoError::IdentityResolution(_) => "Failed to get user info from provider".to_string(),
            SsoError::IdentityNotResolved => "Could not identify user from provider".to_string(),
            SsoError::SessionExpiredForBinding => {
                "Session expired, please login again before binding".to_string()
            }
            SsoError::BindConflict { .. } => {
                "This account is already bound to another user".to_string()
            }
            SsoError::ProviderAlreadyLinked(provider) => {
                format!("Your account is already bound to another {provider} account")
            }
            SsoError::AlreadyBound => "Already bound".to_string(),
            SsoError::AccountDisabled => "User account is disabled or does not exist".to_string(),
            SsoError::UsernameExhausted(_) => {
                "Could not find a free username for this account".to_string()
            }
            SsoError::AccountCreation(_) => "Failed to create user".to_string(),
            SsoError::Database(_) => "An error occurred. Please try again.".to_string(),
        }
    }
}

/// Returns true when the database rejected a write because of a unique index.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_hide_internal_detail() {
        let err = SsoError::TokenExchange("connect timeout to 10.0.0.3:443".into());
        assert_eq!(err.user_message(), "Failed to exchange token");
        assert!(err.to_string().contains("10.0.0.3"));

        let err = SsoError::Database(DbErr::Custom("disk I/O error".into()));
        assert!(!err.user_message().contains("disk"));
    }

    #[test]
    fn bind_conflict_names_the_identity_in_logs_only() {
        let err = SsoError::BindConflict {
            provider: "github".into(),
            provider_uid: "123".into(),
        };
        assert!(err.to_string().contains("github/123"));
        assert_eq!(
            err.user_message(),
            "This account is already bound to another user"
        );
    }

    #[test]
    fn custom_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&DbErr::Custom("boom".into())));
    }
}
