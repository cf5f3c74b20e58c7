//! SeaORM entities.

pub mod sso_config;
pub mod user_auth;
pub mod users;
