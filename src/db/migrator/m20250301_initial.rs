use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{EntityTrait, Schema};

#[derive(DeriveMigrationName)]
pub struct Migration;

async fn create<E: EntityTrait>(
    manager: &SchemaManager<'_>,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    manager
        .create_table(
            schema
                .create_table_from_entity(entity)
                .if_not_exists()
                .to_owned(),
        )
        .await
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        // Parents before children so foreign keys resolve.
        create(manager, &schema, Users).await?;
        create(manager, &schema, Modules).await?;
        create(manager, &schema, Releases).await?;
        create(manager, &schema, Ratings).await?;
        create(manager, &schema, Replies).await?;
        create(manager, &schema, ApiKeys).await?;
        create(manager, &schema, ModuleGithubSync).await?;
        create(manager, &schema, GithubTokens).await?;
        create(manager, &schema, JobRuns).await?;
        create(manager, &schema, SystemLogs).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SystemLogs).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(JobRuns).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GithubTokens).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ModuleGithubSync).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApiKeys).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Replies).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Ratings).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Releases).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Modules).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).if_exists().to_owned())
            .await?;

        Ok(())
    }
}
