//! SSO provider configuration and provider identity bindings.
//!
//! Creates tables for:
//! - sso_config: one row per identity provider
//! - user_auth: binding between a local user and a provider identity

use sea_orm_migration::prelude::*;

use crate::m20260301_000000_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. Provider configuration
        manager
            .create_table(
                Table::create()
                    .table(SsoConfig::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SsoConfig::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SsoConfig::Provider)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(SsoConfig::Enabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(SsoConfig::Name).string().not_null())
                    .col(
                        ColumnDef::new(SsoConfig::ClientId)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(SsoConfig::ClientSecret)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(SsoConfig::IssuerUrl)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(SsoConfig::SamlMetadata)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(SsoConfig::Ext)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(SsoConfig::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SsoConfig::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 2. Identity bindings
        manager
            .create_table(
                Table::create()
                    .table(UserAuth::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserAuth::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserAuth::UserId).integer().not_null())
                    .col(ColumnDef::new(UserAuth::Provider).string().not_null())
                    .col(ColumnDef::new(UserAuth::ProviderUid).string().not_null())
                    .col(
                        ColumnDef::new(UserAuth::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_auth_user_id")
                            .from(UserAuth::Table, UserAuth::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // A provider identity belongs to exactly one user
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_user_auth_provider_uid")
                    .table(UserAuth::Table)
                    .col(UserAuth::Provider)
                    .col(UserAuth::ProviderUid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // A user holds at most one identity per provider
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_user_auth_user_provider")
                    .table(UserAuth::Table)
                    .col(UserAuth::UserId)
                    .col(UserAuth::Provider)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_user_auth_user_provider").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_user_auth_provider_uid").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserAuth::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SsoConfig::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum SsoConfig {
    Table,
    Id,
    Provider,
    Enabled,
    Name,
    ClientId,
    ClientSecret,
    IssuerUrl,
    SamlMetadata,
    Ext,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UserAuth {
    Table,
    Id,
    UserId,
    Provider,
    ProviderUid,
    CreatedAt,
}
