use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::sse::resolver::DbMessageResolver;
use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::Stream;
use log::*;
use service::AppState;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;

/// SSE handler that establishes a long-lived connection for real-time chat
/// updates. One streaming session per open connection; reconnecting clients
/// simply get a fresh session.
pub(crate) async fn event_stream(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Establishing SSE connection for user {}", user.id);

    let (tx, mut rx) = mpsc::unbounded_channel();

    let session = ::sse::StreamingSession::new(
        ::sse::SessionConfig {
            channel: app_state.config.notify_channel.clone(),
            poll_timeout: app_state.config.poll_timeout(),
            keepalive_interval: app_state.config.keepalive_interval(),
        },
        app_state.channel.clone(),
        Arc::new(DbMessageResolver::new(&app_state.database_connection)),
        tx,
    );
    tokio::spawn(session.run());

    let user_id = user.id;

    // Bridge typed session events onto the wire. Dropping `rx` when the
    // response body is torn down is what tells the session to terminate.
    let stream = stream! {
        while let Some(event) = rx.recv().await {
            match event.to_sse_event() {
                Ok(wire_event) => yield Ok(wire_event),
                Err(e) => warn!("Dropping unencodable stream event: {e}"),
            }
        }

        debug!("SSE connection closed for user {user_id}");
    };

    // Keep-alives are emitted by the session itself as named `keepalive`
    // events rather than axum's comment-line KeepAlive, so clients can
    // observe them programmatically.
    Sse::new(stream)
}
