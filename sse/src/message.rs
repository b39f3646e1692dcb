//! Typed events emitted to a streaming client and their wire encoding.

use axum::response::sse;
use serde::Serialize;
use serde_json::Value;

/// Trait for getting the SSE event name on the wire.
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Events a streaming session emits. Payloads serialize to the flat JSON
/// objects clients expect (`untagged`: the event name travels in the SSE
/// `event:` field, not in the payload).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Event {
    /// Sent once on entering the listening state, so clients can distinguish
    /// "freshly opened" from "silently idle".
    Connected { status: &'static str },
    /// Fully resolved chat message; content HTML-escaped upstream.
    Message(Value),
    /// Periodic no-op proving the stream is still live.
    KeepAlive { timestamp: i64 },
    /// Sent once before the stream closes on a fatal failure.
    Error { message: String },
}

impl Event {
    pub fn connected() -> Self {
        Event::Connected {
            status: "connected",
        }
    }

    pub fn keepalive(timestamp: i64) -> Self {
        Event::KeepAlive { timestamp }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Event::Error {
            message: message.into(),
        }
    }

    /// Encode into an axum SSE wire event (`event: <name>\ndata: <json>`).
    pub fn to_sse_event(&self) -> Result<sse::Event, serde_json::Error> {
        Ok(sse::Event::default()
            .event(self.event_type())
            .data(serde_json::to_string(self)?))
    }
}

impl EventType for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::Connected { .. } => "connected",
            Event::Message(_) => "message",
            Event::KeepAlive { .. } => "keepalive",
            Event::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_names_match_the_wire_contract() {
        assert_eq!(Event::connected().event_type(), "connected");
        assert_eq!(Event::Message(json!({})).event_type(), "message");
        assert_eq!(Event::keepalive(0).event_type(), "keepalive");
        assert_eq!(Event::error("boom").event_type(), "error");
    }

    #[test]
    fn connected_payload_shape() {
        let data = serde_json::to_value(Event::connected()).unwrap();
        assert_eq!(data, json!({"status": "connected"}));
    }

    #[test]
    fn keepalive_payload_carries_unix_seconds() {
        let data = serde_json::to_value(Event::keepalive(1_767_225_600)).unwrap();
        assert_eq!(data, json!({"timestamp": 1_767_225_600}));
    }

    #[test]
    fn message_payload_passes_through_untagged() {
        let message = json!({"id": 1, "content": "hi"});
        let data = serde_json::to_value(Event::Message(message.clone())).unwrap();
        assert_eq!(data, message);
    }
}
