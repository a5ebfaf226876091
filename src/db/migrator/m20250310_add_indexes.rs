use crate::entities::{api_keys, modules, prelude::*, ratings, releases, system_logs};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One rating per user per module
        manager
            .create_index(
                Index::create()
                    .name("idx_ratings_module_user")
                    .table(Ratings)
                    .col(ratings::Column::ModuleId)
                    .col(ratings::Column::UserId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_releases_module_id")
                    .table(Releases)
                    .col(releases::Column::ModuleId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_modules_status")
                    .table(Modules)
                    .col(modules::Column::Status)
                    .col(modules::Column::IsPublished)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_api_keys_user_id")
                    .table(ApiKeys)
                    .col(api_keys::Column::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_system_logs_created_at")
                    .table(SystemLogs)
                    .col(system_logs::Column::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_system_logs_created_at")
                    .table(SystemLogs)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx_api_keys_user_id").table(ApiKeys).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_modules_status").table(Modules).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_releases_module_id").table(Releases).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_ratings_module_user").table(Ratings).to_owned())
            .await
    }
}
