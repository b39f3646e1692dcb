use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create the platform's schema
        manager
            .get_connection()
            .execute_unprepared("CREATE SCHEMA IF NOT EXISTS relay_chat;")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("SET search_path TO relay_chat, public;")
            .await?;

        // Create the base DB user that will execute all platform queries
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DO $$ BEGIN
                    GRANT ALL PRIVILEGES ON DATABASE relay TO relay;
                    GRANT ALL ON SCHEMA relay_chat TO relay;

                    ALTER DEFAULT PRIVILEGES IN SCHEMA relay_chat GRANT ALL ON TABLES TO relay;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA relay_chat GRANT ALL ON SEQUENCES TO relay;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA relay_chat GRANT ALL ON FUNCTIONS TO relay;
                END $$;
            "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Revoke default privileges first
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DO $$ BEGIN
                    ALTER DEFAULT PRIVILEGES IN SCHEMA relay_chat REVOKE ALL ON FUNCTIONS FROM relay;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA relay_chat REVOKE ALL ON SEQUENCES FROM relay;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA relay_chat REVOKE ALL ON TABLES FROM relay;
                    REVOKE ALL ON SCHEMA relay_chat FROM relay;
                    REVOKE ALL PRIVILEGES ON DATABASE relay FROM relay;
                END $$;
            "#,
            )
            .await?;

        // Drop the schema (CASCADE will remove all objects in it)
        manager
            .get_connection()
            .execute_unprepared("DROP SCHEMA IF EXISTS relay_chat CASCADE;")
            .await?;

        Ok(())
    }
}
