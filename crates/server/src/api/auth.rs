//! Session authentication extractors.
//!
//! The frontend sends the opaque session token obtained from the SSO
//! callback in the `token` request header.

use crate::AppResources;
use crate::entity::users;
use crate::response::ApiError;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "token";

/// The logged-in, active user behind the request's session token.
///
/// # Example
///
/// ```ignore
/// async fn handler(SessionUser(user): SessionUser) -> impl IntoResponse {
///     format!("Hello, {}", user.username)
/// }
/// ```
pub struct SessionUser(pub users::Model);

/// A [`SessionUser`] holding the administrator role.
pub struct AdminUser(pub users::Model);

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resources = parts
            .extensions
            .get::<AppResources>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("AppResources not found in extensions");
                ApiError::database()
            })?;

        let token = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(ApiError::not_logged_in)?;

        let user = resources
            .sso
            .sessions()
            .resolve(token)
            .await?
            .filter(users::Model::is_active)
            .ok_or_else(ApiError::not_logged_in)?;

        Ok(SessionUser(user))
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let SessionUser(user) = SessionUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = user.id, "non-admin attempted an admin operation");
            return Err(ApiError::no_permission());
        }
        Ok(AdminUser(user))
    }
}
