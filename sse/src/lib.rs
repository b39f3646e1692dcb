//! Server-Sent Events (SSE) infrastructure for real-time chat delivery.
//!
//! This crate contains the notification fan-out pipeline: the bridge from
//! storage-side commit notifications to every open streaming session.
//!
//! # Architecture
//!
//! - **Change notification channel**: Postgres is the event bus. A trigger on
//!   message inserts publishes the new row's id with `pg_notify`; one
//!   dedicated `LISTEN` connection per server process receives those payloads
//!   and fans them out over a broadcast channel. Sessions never share cursors.
//! - **Streaming session**: one task per connected client. The session owns
//!   its read cursor, resolves notified ids against the message store, emits
//!   typed events, and keeps the stream alive with periodic `keepalive`
//!   events.
//! - **Ephemeral events**: notifications are not queued or replayed. A client
//!   that was offline re-fetches history on reconnect; the channel only
//!   carries live events.
//! - **At-least-once, in order**: within one session, events are emitted in
//!   the order the channel delivered them. No cross-session ordering is
//!   guaranteed.
//!
//! # Event flow
//!
//! 1. Client POSTs a message; the insert commits and the trigger publishes
//!    `{id, ...}` on the `new_message` channel.
//! 2. The process-wide listener forwards the raw payload to every session's
//!    cursor.
//! 3. Each session decodes the id, looks the message up, and emits one
//!    `message` event with the HTML-escaped content to its client.
//!
//! # Modules
//!
//! - `channel`: `NotificationChannel`/`Subscription` contract and errors
//! - `postgres`: the `LISTEN`/`NOTIFY`-backed channel implementation
//! - `memory`: in-memory channel satisfying the same contract, for tests
//! - `message`: typed stream events and their wire encoding
//! - `session`: the per-client streaming session state machine

pub mod channel;
pub mod memory;
pub mod message;
pub mod postgres;
pub mod session;

pub use channel::{Error as ChannelError, NotificationChannel, NotificationPayload, Subscription};
pub use memory::MemoryNotificationChannel;
pub use message::{Event, EventType};
pub use postgres::PgNotificationChannel;
pub use session::{MessageResolver, ResolveError, SessionConfig, StreamingSession};
