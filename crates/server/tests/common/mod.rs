//! Shared fixtures for the HTTP-level SSO tests.

#![allow(dead_code)]

use axum_test::TestServer;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbBackend,
    EntityTrait, PaginatorTrait, QueryFilter, Set, Statement,
};
use sso_federation::{
    AppResources,
    api::app,
    config::{AppConfig, SsoSettings},
    entity::{sso_config, user_auth, users},
};
use std::sync::Arc;
use time::OffsetDateTime;

pub const PUBLIC_URL: &str = "https://panel.example.org";
pub const SYSTEM: &str = "/api/system";
pub const TEST_KID: &str = "test-key-1";

const RSA_PEM: &[u8] = include_bytes!("../fixtures/oidc_rsa.pem");
pub const JWKS: &str = include_str!("../fixtures/oidc_jwks.json");

/// Create a test database with the SSO tables
pub async fn create_test_db() -> DatabaseConnection {
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

pub fn create_test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        listen_addr: "127.0.0.1:0".into(),
        public_url: Some(PUBLIC_URL.into()),
        api_prefix: "/api".into(),
        sso: SsoSettings::default(),
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub resources: AppResources,
}

impl TestApp {
    pub fn db(&self) -> &DatabaseConnection {
        self.resources.db.as_ref()
    }

    /// Session token for `user`, as the SSO callback would hand it out.
    pub async fn login_as(&self, user: &users::Model) -> String {
        self.resources
            .sso
            .sessions()
            .issue(user)
            .await
            .expect("issue session")
    }
}

pub async fn create_test_app() -> TestApp {
    let db = Arc::new(create_test_db().await);
    let config = Arc::new(create_test_config());
    let resources = AppResources::new(db, config).expect("resources");
    let server = TestServer::new(app(resources.clone())).expect("create test server");
    TestApp { server, resources }
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

/// GitHub configured against a mock server.
pub async fn insert_github(db: &DatabaseConnection, base: &str) -> sso_config::Model {
    insert_provider(
        db,
        "github",
        true,
        "",
        serde_json::json!({
            "authorizationEndpoint": format!("{base}/login/oauth/authorize"),
            "tokenEndpoint": format!("{base}/login/oauth/access_token"),
            "userInfoEndpoint": format!("{base}/user"),
            "emailsEndpoint": format!("{base}/user/emails"),
        }),
    )
    .await
}

pub async fn insert_user(
    db: &DatabaseConnection,
    username: &str,
    status: i32,
    role: i32,
) -> users::Model {
    let now = OffsetDateTime::now_utc();
    users::ActiveModel {
        username: Set(username.to_string()),
        password: Set("$argon2id$unused".into()),
        name: Set(username.to_string()),
        mail: Set(String::new()),
        status: Set(status),
        role: Set(role),
        token: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert user")
}

pub async fn insert_binding(
    db: &DatabaseConnection,
    user_id: i32,
    provider: &str,
    provider_uid: &str,
) -> user_auth::Model {
    user_auth::ActiveModel {
        user_id: Set(user_id),
        provider: Set(provider.to_string()),
        provider_uid: Set(provider_uid.to_string()),
        created_at: Set(OffsetDateTime::now_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert binding")
}

pub async fn count_users(db: &DatabaseConnection) -> u64 {
    users::Entity::find().count(db).await.expect("count users")
}

pub async fn count_bindings(db: &DatabaseConnection) -> u64 {
    user_auth::Entity::find()
        .count(db)
        .await
        .expect("count bindings")
}

pub async fn binding_of(
    db: &DatabaseConnection,
    provider: &str,
    provider_uid: &str,
) -> Option<user_auth::Model> {
    user_auth::Entity::find()
        .filter(user_auth::Column::Provider.eq(provider))
        .filter(user_auth::Column::ProviderUid.eq(provider_uid))
        .one(db)
        .await
        .expect("query binding")
}

/// `Location` header of a redirect response.
pub fn location(response: &axum_test::TestResponse) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

/// Value of `key` in the query string of `url`.
pub fn query_param(url: &str, key: &str) -> Option<String> {
    url::Url::parse(url)
        .expect("valid url")
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Decoded value following `key=` in a frontend redirect.
///
/// The frontend route lives in the fragment (`/#/login?...`), so the
/// parameter is not part of the URL's query.
pub fn frontend_param(location: &str, key: &str) -> Option<String> {
    let (_, rest) = location.split_once(&format!("{key}="))?;
    let raw = rest.split('&').next().unwrap_or_default();
    urlencoding::decode(raw).ok().map(|v| v.into_owned())
}

/// RS256 ID token signed with the fixture key.
pub fn sign_id_token(claims: serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());
    encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(RSA_PEM).expect("fixture key"),
    )
    .expect("sign")
}

pub fn now_secs() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
