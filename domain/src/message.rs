//! Chat message operations and their outbound representation.

use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use entity::Id;
use entity_api::message::{self as MessageApi, MessageWithAuthor};
use log::*;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

/// The shape a chat message takes on the wire, shared by the history
/// endpoint and the `message` stream event.
///
/// `content` is HTML-escaped here, at the single point every outbound path
/// goes through; the stored body stays raw.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[schema(as = domain::message::ChatMessage)]
pub struct ChatMessage {
    pub id: Id,
    pub user_id: Id,
    pub username: String,
    pub avatar_url: Option<String>,
    /// HTML-escaped message body, safe to interpolate into markup
    pub content: String,
    /// ISO-8601 creation timestamp
    pub created_at: String,
}

impl From<MessageWithAuthor> for ChatMessage {
    fn from(record: MessageWithAuthor) -> Self {
        Self {
            id: record.message.id,
            user_id: record.message.user_id,
            username: record.username,
            avatar_url: record.avatar_url,
            content: html_escape::encode_text(&record.message.content).into_owned(),
            created_at: record.message.created_at.to_rfc3339(),
        }
    }
}

/// Persist a new message. The same durable commit fires the storage-side
/// notification trigger, so no explicit publish happens here.
pub async fn create(
    db: &DatabaseConnection,
    user_id: Id,
    content: String,
) -> Result<ChatMessage, Error> {
    let message = MessageApi::create(db, user_id, content).await?;

    debug!("Created message {} for user {user_id}", message.id);

    match MessageApi::find_by_id_with_author(db, message.id).await? {
        Some(record) => Ok(record.into()),
        None => Err(Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(format!(
                "freshly created message {} has no author",
                message.id
            ))),
        }),
    }
}

/// Resolve a message id as notified by the change channel. `None` when the
/// record no longer exists or the notification was stale.
pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Option<ChatMessage>, Error> {
    trace!("Resolving notified message {id}");

    Ok(MessageApi::find_by_id_with_author(db, id)
        .await?
        .map(ChatMessage::from))
}

/// Full history, ordered by creation time.
pub async fn list(db: &DatabaseConnection) -> Result<Vec<ChatMessage>, Error> {
    Ok(MessageApi::list_with_authors(db)
        .await?
        .into_iter()
        .map(ChatMessage::from)
        .collect())
}
