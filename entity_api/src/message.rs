use super::error::Error;
use chrono::Utc;
use entity::messages::{ActiveModel, Column, Entity, Model};
use entity::{users, Id};
use log::*;
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, ConnectionTrait, QueryOrder, TryIntoModel,
};
use serde::Serialize;

/// A chat message joined with its author's public profile fields.
///
/// The author's username and avatar are denormalized here so that callers
/// (the history endpoint and the event stream) never need a second lookup.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MessageWithAuthor {
    pub message: Model,
    pub username: String,
    pub avatar_url: Option<String>,
}

pub async fn create(db: &impl ConnectionTrait, user_id: Id, content: String) -> Result<Model, Error> {
    debug!("New Message to be inserted for user {user_id}");

    let now = Utc::now();

    let message_active_model: ActiveModel = ActiveModel {
        user_id: Set(user_id),
        content: Set(content),
        created_at: Set(now.into()),
        ..Default::default()
    };

    Ok(message_active_model.save(db).await?.try_into_model()?)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Option<Model>, Error> {
    Ok(Entity::find_by_id(id).one(db).await?)
}

/// Look up one message together with its author. Returns `None` when the
/// message does not exist or its author row is gone (the record may have
/// been deleted between the notification firing and this lookup).
pub async fn find_by_id_with_author(
    db: &impl ConnectionTrait,
    id: Id,
) -> Result<Option<MessageWithAuthor>, Error> {
    let result = Entity::find_by_id(id)
        .find_also_related(users::Entity)
        .one(db)
        .await?;

    match result {
        Some((message, Some(author))) => Ok(Some(MessageWithAuthor {
            message,
            username: author.username,
            avatar_url: author.github_avatar_url,
        })),
        Some((message, None)) => {
            warn!("Message {} has no author row", message.id);
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Full chat history with authors, ordered by creation time.
/// Ties on the timestamp are broken by id, which is monotonic.
pub async fn list_with_authors(db: &impl ConnectionTrait) -> Result<Vec<MessageWithAuthor>, Error> {
    let results = Entity::find()
        .find_also_related(users::Entity)
        .order_by_asc(Column::CreatedAt)
        .order_by_asc(Column::Id)
        .all(db)
        .await?;

    Ok(results
        .into_iter()
        .filter_map(|(message, author)| {
            author.map(|author| MessageWithAuthor {
                message,
                username: author.username,
                avatar_url: author.github_avatar_url,
            })
        })
        .collect())
}

#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn message_model(id: Id, user_id: Id, content: &str) -> Model {
        Model {
            id,
            user_id,
            content: content.to_string(),
            created_at: chrono::Utc::now().into(),
        }
    }

    fn user_model(id: Id, username: &str) -> users::Model {
        let now = chrono::Utc::now();
        users::Model {
            id,
            username: username.to_string(),
            password: "hash".to_string(),
            github_avatar_url: Some(format!("https://avatars.example/{username}")),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[tokio::test]
    async fn find_by_id_with_author_joins_author_fields() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[(
                message_model(42, 7, "hello"),
                user_model(7, "alice"),
            )]])
            .into_connection();

        let record = find_by_id_with_author(&db, 42).await?.unwrap();

        assert_eq!(record.message.id, 42);
        assert_eq!(record.username, "alice");
        assert_eq!(
            record.avatar_url.as_deref(),
            Some("https://avatars.example/alice")
        );
        Ok(())
    }

    #[tokio::test]
    async fn find_by_id_with_author_returns_none_for_missing_record() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<(Model, users::Model)>::new()])
            .into_connection();

        assert!(find_by_id_with_author(&db, 999).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn list_with_authors_preserves_creation_order() -> Result<(), Error> {
        let alice = user_model(1, "alice");
        let bob = user_model(2, "bob");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                (message_model(1, 1, "first"), alice),
                (message_model(2, 2, "second"), bob),
            ]])
            .into_connection();

        let records = list_with_authors(&db).await?;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message.content, "first");
        assert_eq!(records[1].username, "bob");
        Ok(())
    }
}
