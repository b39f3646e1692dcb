use crate::error::Error;
use entity::{users, Id};
use sea_orm::DatabaseConnection;

pub use entity_api::user::{AuthSession, Backend, Credentials};

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<users::Model, Error> {
    Ok(entity_api::user::find_by_id(db, id).await?)
}

pub async fn create(db: &DatabaseConnection, user_model: users::Model) -> Result<users::Model, Error> {
    Ok(entity_api::user::create(db, user_model).await?)
}
