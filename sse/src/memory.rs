//! In-memory notification channel satisfying the same subscribe/poll/
//! unsubscribe contract as the Postgres one. Lets tests drive the full
//! session state machine deterministically, without a live database.

use crate::channel::{
    BroadcastSubscription, Error, NotificationChannel, Subscription, FANOUT_BUFFER,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

pub struct MemoryNotificationChannel {
    sender: broadcast::Sender<String>,
    available: AtomicBool,
}

impl MemoryNotificationChannel {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(FANOUT_BUFFER).0,
            available: AtomicBool::new(true),
        }
    }

    /// Publish a raw payload to every open cursor, as the storage trigger
    /// would on commit. Returns the number of cursors that received it;
    /// nobody listening means the event is simply lost.
    pub fn publish(&self, payload: &str) -> usize {
        self.sender.send(payload.to_owned()).unwrap_or(0)
    }

    /// Simulate the storage engine losing (or lacking) its pub/sub primitive.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of cursors currently open on this channel.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemoryNotificationChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for MemoryNotificationChannel {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, Error> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::Unavailable(format!(
                "no pub/sub backend for channel '{channel}'"
            )));
        }
        Ok(Box::new(BroadcastSubscription::new(self.sender.subscribe())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn poll_times_out_with_nothing_published() {
        let channel = MemoryNotificationChannel::new();
        let mut subscription = channel.subscribe("new_message").await.unwrap();

        let polled = subscription.poll(Duration::from_millis(250)).await.unwrap();
        assert!(polled.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn published_payload_reaches_an_open_cursor() {
        let channel = MemoryNotificationChannel::new();
        let mut subscription = channel.subscribe("new_message").await.unwrap();

        assert_eq!(channel.publish(r#"{"id": 5}"#), 1);

        let payload = subscription
            .poll(Duration::from_millis(250))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload.id, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_without_subscribers_is_lost() {
        let channel = MemoryNotificationChannel::new();
        assert_eq!(channel.publish(r#"{"id": 1}"#), 0);

        // A cursor opened afterwards sees nothing: live events only.
        let mut subscription = channel.subscribe("new_message").await.unwrap();
        let polled = subscription.poll(Duration::from_millis(250)).await.unwrap();
        assert!(polled.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_is_idempotent_and_releases_the_cursor() {
        let channel = MemoryNotificationChannel::new();
        let mut subscription = channel.subscribe("new_message").await.unwrap();
        assert_eq!(channel.subscriber_count(), 1);

        subscription.unsubscribe().await;
        subscription.unsubscribe().await;
        assert_eq!(channel.subscriber_count(), 0);

        assert!(matches!(
            subscription.poll(Duration::from_millis(250)).await,
            Err(Error::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_backend_rejects_subscribe() {
        let channel = MemoryNotificationChannel::new();
        channel.set_available(false);

        assert!(matches!(
            channel.subscribe("new_message").await,
            Err(Error::Unavailable(_))
        ));
    }
}
