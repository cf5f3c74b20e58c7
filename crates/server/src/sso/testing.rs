//! In-memory database fixtures shared by the unit tests of this module.

use crate::entity::{sso_config, users};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, DbBackend, Set, Statement,
};
use time::OffsetDateTime;

pub async fn memory_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("connect");

    for sql in [
        r#"CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            name TEXT NOT NULL,
            mail TEXT NOT NULL,
            status INTEGER NOT NULL,
            role INTEGER NOT NULL,
            token TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE sso_config (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider TEXT NOT NULL UNIQUE,
            enabled BOOLEAN NOT NULL,
            name TEXT NOT NULL,
            client_id TEXT NOT NULL,
            client_secret TEXT NOT NULL,
            issuer_url TEXT NOT NULL,
            saml_metadata TEXT NOT NULL,
            ext TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE user_auth (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            provider TEXT NOT NULL,
            provider_uid TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (provider, provider_uid),
            UNIQUE (user_id, provider)
        );"#,
    ] {
        db.execute(Statement::from_string(DbBackend::Sqlite, sql))
            .await
            .expect("create table");
    }

    db
}

pub async fn insert_provider(
    db: &DatabaseConnection,
    provider: &str,
    enabled: bool,
    issuer_url: &str,
    ext: serde_json::Value,
) -> sso_config::Model {
    let now = OffsetDateTime::now_utc();
    sso_config::ActiveModel {
        provider: Set(provider.to_string()),
        enabled: Set(enabled),
        name: Set(format!("{provider} login")),
        client_id: Set("client-1".into()),
        client_secret: Set("secret-1".into()),
        issuer_url: Set(issuer_url.to_string()),
        saml_metadata: Set(String::new()),
        ext: Set(ext.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert provider")
}

pub async fn insert_user(db: &DatabaseConnection, username: &str, status: i32) -> users::Model {
    let now = OffsetDateTime::now_utc();
    users::ActiveModel {
        username: Set(username.to_string()),
        password: Set("$argon2id$unused".into()),
        name: Set(username.to_string()),
        mail: Set(String::new()),
        status: Set(status),
        role: Set(users::ROLE_USER),
        token: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert user")
}
