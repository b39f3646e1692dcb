//! The per-client streaming session state machine.
//!
//! One session per open stream response, one task per session. States:
//! connecting (subscribe on the channel), listening (poll, resolve, emit,
//! keep-alive), terminating (unsubscribe, drop the event sender). Reconnects
//! are the client's responsibility at the transport boundary; a session never
//! retries its own channel.

use crate::channel::{Error as ChannelError, NotificationChannel, Subscription};
use crate::message::{Event, EventType};
use async_trait::async_trait;
use chrono::Utc;
use log::*;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

/// Resolves a notified message id against the message store.
///
/// `Ok(None)` means the record is gone or the notification was stale; the
/// session skips it without surfacing anything to the client.
#[async_trait]
pub trait MessageResolver: Send + Sync {
    async fn resolve(&self, id: i64) -> Result<Option<Value>, ResolveError>;
}

/// Store lookup failure, split by whether the session can keep going.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolveError {
    /// Logged, the event is skipped, the loop continues.
    Transient(String),
    /// Terminates the session after one `error` event.
    Fatal(String),
}

/// Tunables for one streaming session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Notification channel name to subscribe on.
    pub channel: String,
    /// Upper bound on one poll. Also bounds how quickly a client disconnect
    /// is observed, since the closed-sender check runs once per iteration.
    pub poll_timeout: Duration,
    /// Idle interval after which a `keepalive` event is emitted.
    pub keepalive_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel: "new_message".to_string(),
            poll_timeout: Duration::from_millis(250),
            keepalive_interval: Duration::from_secs(30),
        }
    }
}

pub struct StreamingSession {
    config: SessionConfig,
    channel: Arc<dyn NotificationChannel>,
    resolver: Arc<dyn MessageResolver>,
    events: UnboundedSender<Event>,
}

impl StreamingSession {
    pub fn new(
        config: SessionConfig,
        channel: Arc<dyn NotificationChannel>,
        resolver: Arc<dyn MessageResolver>,
        events: UnboundedSender<Event>,
    ) -> Self {
        Self {
            config,
            channel,
            resolver,
            events,
        }
    }

    /// Drive the session to completion: subscribe, announce, deliver, clean
    /// up. Returns when the client disconnects or a fatal channel/store
    /// failure occurs. Every exit path releases the subscription.
    pub async fn run(self) {
        let mut subscription = match self.channel.subscribe(&self.config.channel).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!("failed to open notification channel: {e}");
                self.emit(&Event::error("notification channel unavailable"));
                return;
            }
        };

        self.emit(&Event::connected());
        self.listen(subscription.as_mut()).await;
        subscription.unsubscribe().await;
    }

    async fn listen(&self, subscription: &mut dyn Subscription) {
        let mut last_keepalive = Instant::now();

        loop {
            // Peer closed the response: the receiving half of the event
            // pipe is gone.
            if self.events.is_closed() {
                debug!("client disconnected, terminating session");
                return;
            }

            match subscription.poll(self.config.poll_timeout).await {
                Ok(Some(payload)) => {
                    if !self.deliver(payload.id).await {
                        return;
                    }
                }
                Ok(None) => {}
                Err(ChannelError::MalformedPayload(e)) => {
                    warn!("ignoring malformed notification payload: {e}");
                }
                Err(e @ ChannelError::Unavailable(_)) => {
                    error!("notification channel lost: {e}");
                    self.emit(&Event::error("notification channel lost"));
                    return;
                }
            }

            if last_keepalive.elapsed() >= self.config.keepalive_interval {
                if !self.emit(&Event::keepalive(Utc::now().timestamp())) {
                    return;
                }
                last_keepalive = Instant::now();
            }
        }
    }

    /// Resolve one notified id and emit its `message` event.
    /// Returns false when the session must terminate.
    async fn deliver(&self, id: i64) -> bool {
        match self.resolver.resolve(id).await {
            Ok(Some(message)) => self.emit(&Event::Message(message)),
            Ok(None) => {
                warn!("notified message {id} not found, skipping");
                true
            }
            Err(ResolveError::Transient(e)) => {
                warn!("transient lookup failure for message {id}: {e}");
                true
            }
            Err(ResolveError::Fatal(e)) => {
                error!("unrecoverable store failure for message {id}: {e}");
                self.emit(&Event::error("message store failure"));
                false
            }
        }
    }

    /// Returns false when the client side of the event pipe is gone.
    fn emit(&self, event: &Event) -> bool {
        trace!("emitting {} event", event.event_type());
        self.events.send(event.clone()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryNotificationChannel;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    struct StubResolver {
        messages: HashMap<i64, Value>,
        failure: Option<ResolveError>,
    }

    impl StubResolver {
        fn with_messages(ids: &[i64]) -> Self {
            let messages = ids
                .iter()
                .map(|id| (*id, json!({"id": id, "content": format!("message {id}")})))
                .collect();
            Self {
                messages,
                failure: None,
            }
        }

        fn failing(failure: ResolveError) -> Self {
            Self {
                messages: HashMap::new(),
                failure: Some(failure),
            }
        }
    }

    #[async_trait]
    impl MessageResolver for StubResolver {
        async fn resolve(&self, id: i64) -> Result<Option<Value>, ResolveError> {
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            Ok(self.messages.get(&id).cloned())
        }
    }

    fn test_config() -> SessionConfig {
        SessionConfig::default()
    }

    fn spawn_session(
        channel: Arc<MemoryNotificationChannel>,
        resolver: StubResolver,
    ) -> (UnboundedReceiver<Event>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session =
            StreamingSession::new(test_config(), channel, Arc::new(resolver), tx);
        (rx, tokio::spawn(session.run()))
    }

    async fn expect_connected(rx: &mut UnboundedReceiver<Event>) {
        match rx.recv().await {
            Some(Event::Connected { status }) => assert_eq!(status, "connected"),
            other => panic!("expected connected event, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_messages_in_creation_order() {
        let channel = Arc::new(MemoryNotificationChannel::new());
        let (mut rx, handle) = spawn_session(channel.clone(), StubResolver::with_messages(&[1, 2, 3]));

        expect_connected(&mut rx).await;
        for id in 1..=3 {
            channel.publish(&format!(r#"{{"id": {id}}}"#));
        }

        for expected in 1..=3 {
            match rx.recv().await {
                Some(Event::Message(value)) => assert_eq!(value["id"], expected),
                other => panic!("expected message event, got {other:?}"),
            }
        }

        drop(rx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_notification_is_skipped_without_termination() {
        let channel = Arc::new(MemoryNotificationChannel::new());
        let (mut rx, handle) = spawn_session(channel.clone(), StubResolver::with_messages(&[2]));

        expect_connected(&mut rx).await;
        channel.publish(r#"{"id": 99}"#);
        channel.publish(r#"{"id": 2}"#);

        // Only the resolvable id produces an event; the session lives on.
        match rx.recv().await {
            Some(Event::Message(value)) => assert_eq!(value["id"], 2),
            other => panic!("expected message event, got {other:?}"),
        }

        drop(rx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payload_is_ignored() {
        let channel = Arc::new(MemoryNotificationChannel::new());
        let (mut rx, handle) = spawn_session(channel.clone(), StubResolver::with_messages(&[7]));

        expect_connected(&mut rx).await;
        channel.publish("definitely not json");
        channel.publish(r#"{"id": 7}"#);

        match rx.recv().await {
            Some(Event::Message(value)) => assert_eq!(value["id"], 7),
            other => panic!("expected message event, got {other:?}"),
        }

        drop(rx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn transient_lookup_failure_keeps_the_session_alive() {
        let channel = Arc::new(MemoryNotificationChannel::new());
        let (mut rx, handle) = spawn_session(
            channel.clone(),
            StubResolver::failing(ResolveError::Transient("pool timeout".to_string())),
        );

        expect_connected(&mut rx).await;
        channel.publish(r#"{"id": 1}"#);

        // Nothing is emitted for the failed lookup and the subscription stays open.
        let polled = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(polled.is_err(), "no event expected, got {polled:?}");
        assert_eq!(channel.subscriber_count(), 1);

        drop(rx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_lookup_failure_emits_one_error_and_terminates() {
        let channel = Arc::new(MemoryNotificationChannel::new());
        let (mut rx, handle) = spawn_session(
            channel.clone(),
            StubResolver::failing(ResolveError::Fatal("store corrupted".to_string())),
        );

        expect_connected(&mut rx).await;
        channel.publish(r#"{"id": 1}"#);

        match rx.recv().await {
            Some(Event::Error { .. }) => {}
            other => panic!("expected error event, got {other:?}"),
        }

        handle.await.unwrap();
        assert!(rx.recv().await.is_none());
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_channel_emits_one_error_and_never_connected() {
        let channel = Arc::new(MemoryNotificationChannel::new());
        channel.set_available(false);
        let (mut rx, handle) = spawn_session(channel, StubResolver::with_messages(&[]));

        match rx.recv().await {
            Some(Event::Error { message }) => {
                assert_eq!(message, "notification channel unavailable")
            }
            other => panic!("expected error event, got {other:?}"),
        }

        handle.await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_cadence_is_one_per_interval() {
        let channel = Arc::new(MemoryNotificationChannel::new());
        let (mut rx, handle) = spawn_session(channel, StubResolver::with_messages(&[]));

        expect_connected(&mut rx).await;
        tokio::time::sleep(Duration::from_secs(95)).await;

        let mut keepalives = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                Event::KeepAlive { .. } => keepalives += 1,
                other => panic!("unexpected event {other:?}"),
            }
        }
        // 95s of idle at a 30s interval: keepalives at 30, 60 and 90.
        assert_eq!(keepalives, 3);

        drop(rx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_releases_the_subscription() {
        let channel = Arc::new(MemoryNotificationChannel::new());

        // Several open/close cycles must not leak cursors.
        for _ in 0..3 {
            let (mut rx, handle) =
                spawn_session(channel.clone(), StubResolver::with_messages(&[]));
            expect_connected(&mut rx).await;
            assert_eq!(channel.subscriber_count(), 1);

            drop(rx);
            handle.await.unwrap();
            assert_eq!(channel.subscriber_count(), 0);
        }
    }
}
