use config::{Config, File};
use sea_orm_migration::prelude::*;
use std::env;

/// Resolve `database_url` from the service's `config.yaml` when the
/// environment does not provide `DATABASE_URL`.
fn database_url_from_config() -> Option<String> {
    let settings = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .build()
        .map_err(|e| eprintln!("Ignoring config.yaml: {e}"))
        .ok()?;
    settings.get_string("database_url").ok()
}

#[tokio::main]
async fn main() {
    if env::var("DATABASE_URL").is_err() {
        if let Some(url) = database_url_from_config() {
            env::set_var("DATABASE_URL", url);
        }
    }
    cli::run_cli(migration::Migrator).await;
}
