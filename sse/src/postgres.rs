//! Postgres `LISTEN`/`NOTIFY`-backed notification channel.
//!
//! One dedicated listen connection per channel name per server process. The
//! listen/notify registration is connection-scoped, so these connections are
//! never pooled or shared with query traffic; sessions get private cursors
//! over a broadcast fan-out instead of their own database connections.

use crate::channel::{
    BroadcastSubscription, Error, NotificationChannel, Subscription, FANOUT_BUFFER,
};
use async_trait::async_trait;
use log::*;
use sqlx::postgres::PgListener;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex};

pub struct PgNotificationChannel {
    database_url: String,
    // One fan-out per channel name. The relay task holds the only strong
    // reference to its sender; when the task exits (connection lost or last
    // subscriber gone) the weak handle stops upgrading and the next
    // subscribe on that name reconnects.
    fanouts: Mutex<HashMap<String, Weak<broadcast::Sender<String>>>>,
}

impl PgNotificationChannel {
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_owned(),
            fanouts: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl NotificationChannel for PgNotificationChannel {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, Error> {
        let mut fanouts = self.fanouts.lock().await;

        if let Some(sender) = fanouts.get(channel).and_then(Weak::upgrade) {
            return Ok(Box::new(BroadcastSubscription::new(sender.subscribe())));
        }

        let mut listener = PgListener::connect(&self.database_url)
            .await
            .map_err(|e| Error::Unavailable(format!("connecting listener: {e}")))?;
        listener
            .listen(channel)
            .await
            .map_err(|e| Error::Unavailable(format!("LISTEN {channel}: {e}")))?;

        let sender = Arc::new(broadcast::channel(FANOUT_BUFFER).0);
        let receiver = sender.subscribe();
        fanouts.insert(channel.to_owned(), Arc::downgrade(&sender));

        info!("Postgres listener established on channel '{channel}'");
        tokio::spawn(relay_notifications(listener, sender));

        Ok(Box::new(BroadcastSubscription::new(receiver)))
    }
}

/// Forward raw notification payloads from the dedicated listen connection to
/// every open cursor. Exits when the connection breaks, or on the first
/// notification that finds no subscribers left; until one arrives, an idle
/// listener keeps its dedicated connection open.
async fn relay_notifications(mut listener: PgListener, sender: Arc<broadcast::Sender<String>>) {
    loop {
        match listener.recv().await {
            Ok(notification) => {
                trace!("notification received: {}", notification.payload());
                if sender.send(notification.payload().to_owned()).is_err() {
                    debug!("last subscriber gone, closing Postgres listener");
                    break;
                }
            }
            Err(e) => {
                error!("Postgres listener connection lost: {e}");
                break;
            }
        }
    }
}
