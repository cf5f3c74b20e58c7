//! OpenAPI/Utoipa configuration.

use crate::api::{auth::TOKEN_HEADER, health::MISC_TAG};
use crate::sso::{SSO_CONFIG_TAG, SSO_TAG};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    #[tracing::instrument(skip(self, openapi))]
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        // Opaque session token from the SSO callback's `ssoToken`
        let token = ApiKey::Header(ApiKeyValue::with_description(
            TOKEN_HEADER,
            "Session token delivered to the frontend as `ssoToken` after an SSO login.",
        ));
        components.add_security_scheme("token", SecurityScheme::ApiKey(token));
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "SSO Federation API",
        version = "1.0.0",
        description = "Single-Sign-On through GitHub, Google and generic OpenID Connect providers."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = SSO_TAG, description = "SSO login, callback and identity bindings"),
        (name = SSO_CONFIG_TAG, description = "Identity provider configuration (administrators)")
    )
)]
pub struct ApiDoc;
