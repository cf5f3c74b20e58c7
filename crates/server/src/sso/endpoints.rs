//! SSO HTTP handlers: provider list, login redirect, callback, bindings.

use crate::AppResources;
use crate::api::auth::SessionUser;
use crate::config::AppConfig;
use crate::error::SsoError;
use crate::response::{ApiError, ApiJson, ApiResponse, ApiStatus};
use crate::sso::SSO_TAG;
use crate::sso::service::{BindingSummary, CallbackResult, ProviderSummary};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

pub fn router(resources: AppResources) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_providers))
        .routes(routes!(login))
        .routes(routes!(callback))
        .routes(routes!(get_user_bindings))
        .routes(routes!(unbind))
        .with_state(resources)
}

/// 302 Found to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn valid_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
}

/// Externally visible origin of this request, e.g. `https://panel.example.org`.
///
/// `public_url` wins when configured. Otherwise the scheme is `https` if a
/// proxy says so (`X-Forwarded-Proto` or `Forwarded: proto=https`) and the
/// host comes from the `Host` header.
pub fn request_origin(headers: &HeaderMap, config: &AppConfig) -> String {
    if let Some(public_url) = config.public_url.as_deref() {
        return public_url.trim_end_matches('/').to_string();
    }

    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let forwarded_https = header_str("x-forwarded-proto")
        .and_then(|v| v.split(',').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("https"));
    let rfc7239_https = header_str(header::FORWARDED.as_str()).is_some_and(|v| {
        v.split([';', ','])
            .any(|part| part.trim().eq_ignore_ascii_case("proto=https"))
    });
    let scheme = if forwarded_https || rfc7239_https {
        "https"
    } else {
        "http"
    };

    let host = header_str(header::HOST.as_str())
        .map(str::trim)
        .filter(|h| valid_host(h))
        .unwrap_or("localhost");

    format!("{scheme}://{host}")
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LoginQuery {
    /// Session token of a logged-in user who wants to bind this provider
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UnbindRequest {
    pub provider: String,
}

#[utoipa::path(
    get,
    path = "/sso/providers",
    tag = SSO_TAG,
    operation_id = "List SSO Providers",
    summary = "Enabled identity providers",
    description = "Lists the enabled providers in configuration order, for rendering the login page.",
    responses(
        (status = 200, description = "Enabled providers", body = ApiResponse<Vec<ProviderSummary>>),
        (status = 500, description = "Database error", body = ApiStatus)
    )
)]
#[tracing::instrument(skip(resources))]
pub async fn list_providers(
    State(resources): State<AppResources>,
) -> Result<ApiResponse<Vec<ProviderSummary>>, ApiError> {
    Ok(ApiResponse::ok(resources.sso.list_providers().await?))
}

#[utoipa::path(
    get,
    path = "/sso/login/{provider}",
    tag = SSO_TAG,
    operation_id = "Start SSO Login",
    summary = "Redirect to the identity provider",
    description = "Issues a one-time state and redirects to the provider's authorization page.\n\n\
                   Passing the current session `token` binds the provider to that account instead of logging in. \
                   Unknown or disabled providers redirect to the frontend login route with `ssoError`.",
    params(
        ("provider" = String, Path, description = "Provider key, e.g. `github`"),
        LoginQuery
    ),
    responses(
        (status = 302, description = "Redirect to the provider, or to the frontend with `ssoError`")
    )
)]
#[tracing::instrument(skip(resources, query, headers))]
pub async fn login(
    State(resources): State<AppResources>,
    Path(provider): Path<String>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
) -> Response {
    let origin = request_origin(&headers, &resources.config);
    match resources.sso.start_login(&provider, &origin, query.token).await {
        Ok(url) => found(&url),
        Err(e) => {
            tracing::warn!(error = %e, "cannot start SSO login");
            found(
                &resources
                    .sso
                    .frontend_redirect(&origin, &CallbackResult::Notice(e.user_message())),
            )
        }
    }
}

#[utoipa::path(
    get,
    path = "/sso/callback/{provider}",
    tag = SSO_TAG,
    operation_id = "SSO Callback",
    summary = "Provider redirect target",
    description = "Completes the Authorization Code flow and redirects to the frontend login route with \
                   either `ssoToken` (login) or `ssoError` (failure, or the bind outcome).",
    params(
        ("provider" = String, Path, description = "Provider key"),
        CallbackQuery
    ),
    responses(
        (status = 302, description = "Redirect to the frontend login route"),
        (status = 400, description = "Missing code or state, or the state is invalid or expired", body = str, content_type = "text/plain"),
        (status = 500, description = "Provider configuration cannot be resolved", body = str, content_type = "text/plain")
    )
)]
#[tracing::instrument(skip(resources, query, headers))]
pub async fn callback(
    State(resources): State<AppResources>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Response {
    let origin = request_origin(&headers, &resources.config);
    let outcome = resources
        .sso
        .handle_callback(
            &provider,
            query.code.as_deref(),
            query.state.as_deref(),
            &origin,
        )
        .await;

    match outcome {
        Ok(result) => found(&resources.sso.frontend_redirect(&origin, &result)),
        Err(e @ (SsoError::MalformedCallbackRequest | SsoError::InvalidOrExpiredState)) => {
            tracing::warn!(error = %e, "rejected SSO callback");
            (StatusCode::BAD_REQUEST, e.user_message()).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "SSO callback cannot resolve provider");
            (StatusCode::INTERNAL_SERVER_ERROR, e.user_message()).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/sso/getUserBindings",
    tag = SSO_TAG,
    operation_id = "List SSO Bindings",
    summary = "Provider identities bound to the current user",
    security(("token" = [])),
    responses(
        (status = 200, description = "Bindings of the current user", body = ApiResponse<Vec<BindingSummary>>),
        (status = 401, description = "Not logged in", body = ApiStatus)
    )
)]
#[tracing::instrument(skip(resources, user), fields(user_id = user.id))]
pub async fn get_user_bindings(
    State(resources): State<AppResources>,
    SessionUser(user): SessionUser,
) -> Result<ApiResponse<Vec<BindingSummary>>, ApiError> {
    Ok(ApiResponse::ok(resources.sso.list_bindings(&user).await?))
}

#[utoipa::path(
    post,
    path = "/sso/unbind",
    tag = SSO_TAG,
    operation_id = "Unbind SSO Provider",
    summary = "Remove the current user's binding for a provider",
    description = "Succeeds even when no binding existed.",
    security(("token" = [])),
    request_body = UnbindRequest,
    responses(
        (status = 200, description = "Binding removed", body = ApiStatus),
        (status = 400, description = "Missing provider or malformed body", body = ApiStatus),
        (status = 401, description = "Not logged in", body = ApiStatus)
    )
)]
#[tracing::instrument(skip(resources, user, request), fields(user_id = user.id))]
pub async fn unbind(
    State(resources): State<AppResources>,
    SessionUser(user): SessionUser,
    ApiJson(request): ApiJson<UnbindRequest>,
) -> Result<ApiResponse<()>, ApiError> {
    let provider = request.provider.trim();
    if provider.is_empty() {
        return Err(ApiError::param("provider is required"));
    }
    resources.sso.unbind(&user, provider).await?;
    Ok(ApiResponse::success())
}
