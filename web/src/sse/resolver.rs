use async_trait::async_trait;
use domain::error::{DomainErrorKind, EntityErrorKind, Error as DomainError, InternalErrorKind};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use sse::{MessageResolver, ResolveError};
use std::sync::Arc;

/// Resolves notified message ids against the application database, producing
/// the same `ChatMessage` JSON the history endpoint returns.
pub(crate) struct DbMessageResolver {
    db: Arc<DatabaseConnection>,
}

impl DbMessageResolver {
    pub(crate) fn new(db: &Arc<DatabaseConnection>) -> Self {
        Self { db: Arc::clone(db) }
    }
}

#[async_trait]
impl MessageResolver for DbMessageResolver {
    async fn resolve(&self, id: i64) -> Result<Option<Value>, ResolveError> {
        match domain::message::find_by_id(self.db.as_ref(), id).await {
            Ok(Some(message)) => serde_json::to_value(&message)
                .map(Some)
                .map_err(|e| ResolveError::Fatal(format!("encoding message {id}: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(classify(e)),
        }
    }
}

// Lookup failures driven by load or connectivity blips are worth riding out;
// anything else means the session cannot make progress.
fn classify(error: DomainError) -> ResolveError {
    match &error.error_kind {
        DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Other(_))) => {
            ResolveError::Transient(error.to_string())
        }
        _ => ResolveError::Fatal(error.to_string()),
    }
}
