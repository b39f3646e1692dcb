pub use sea_orm_migration::prelude::*;

mod m20240210_153056_create_schema_and_base_db_setup;
mod m20240211_174355_create_users_and_messages_tables;
mod m20240212_093000_create_message_notify_trigger;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240210_153056_create_schema_and_base_db_setup::Migration),
            Box::new(m20240211_174355_create_users_and_messages_tables::Migration),
            Box::new(m20240212_093000_create_message_notify_trigger::Migration),
        ]
    }
}
