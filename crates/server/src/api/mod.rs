//! API module wiring the HTTP surface.
//!
//! This module is organized into submodules:
//! - `auth` - session token extractors
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration
//!
//! The SSO handlers themselves live in [`crate::sso::endpoints`] and
//! [`crate::sso::admin`] and are mounted under `{api_prefix}/system`.

pub mod auth;
pub mod health;
pub mod openapi;

pub use health::MISC_TAG;

use crate::AppResources;
use crate::sso::{admin, endpoints};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Build the application router with all routes, layers and API docs.
pub fn app(resources: AppResources) -> Router {
    let system_prefix = format!("{}/system", resources.config.api_prefix);

    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest(
            &system_prefix,
            endpoints::router(resources.clone()).merge(admin::router(resources.clone())),
        )
        .routes(routes!(health::health))
        .layer(axum::Extension(resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(resources))]
pub async fn start_webserver(resources: AppResources) -> color_eyre::Result<()> {
    let addr = resources.config.listen_addr.clone();
    let router = app(resources);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
