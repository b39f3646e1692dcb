use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // AFTER INSERT runs inside the inserting transaction and pg_notify
        // queues the notification transactionally, so listeners only ever
        // observe committed messages. The channel name must match the
        // NOTIFY_CHANNEL the server subscribes on.
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE OR REPLACE FUNCTION relay_chat.notify_new_message() RETURNS trigger AS $$
                BEGIN
                    PERFORM pg_notify(
                        'new_message',
                        json_build_object(
                            'id', NEW.id,
                            'user_id', NEW.user_id,
                            'content', NEW.content,
                            'created_at', NEW.created_at
                        )::text
                    );
                    RETURN NEW;
                END;
                $$ LANGUAGE plpgsql;
            "#,
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER messages_notify_new_message
                AFTER INSERT ON relay_chat.messages
                FOR EACH ROW
                EXECUTE FUNCTION relay_chat.notify_new_message();
            "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                "DROP TRIGGER IF EXISTS messages_notify_new_message ON relay_chat.messages;",
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP FUNCTION IF EXISTS relay_chat.notify_new_message();")
            .await?;

        Ok(())
    }
}
