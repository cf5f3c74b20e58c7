use rustls::crypto;
use rustls::crypto::CryptoProvider;
use sea_orm::Database;
use sso_federation::AppResources;
use sso_federation::api::start_webserver;
use sso_federation::config::load_config_or_panic;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "sso_federation=info,tower_http=info,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install().expect("Failed to install `color_eyre::install`");
    dotenvy::dotenv().ok();

    initialize_tracing();

    // Load config
    let config = Arc::new(load_config_or_panic());

    let ring_provider = crypto::ring::default_provider();
    CryptoProvider::install_default(ring_provider).expect("Failed to install crypto provider");

    // Set up SeaORM database connection
    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .expect("Failed to connect to database"),
    );

    let resources = AppResources::new(db, config)?;
    tracing::info!(
        api_prefix = %resources.config.api_prefix,
        public_url = ?resources.config.public_url,
        state_ttl_secs = resources.config.sso.state_ttl_secs,
        "SSO configuration"
    );

    start_webserver(resources).await?;
    Ok(())
}
