//! Live notification events pushed over the per-user stream.
//!
//! Every event carries `type`, `timestamp` and the recipient `userId`;
//! event-specific payloads ride in `data`. Events are fire-and-forget:
//! they are never persisted and never replayed on reconnect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::MessageKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub timestamp: DateTime<Utc>,
    /// The recipient's user id, not the actor's.
    pub user_id: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl NotificationEvent {
    pub fn new(recipient: impl Into<String>, kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: recipient.into(),
            kind,
        }
    }
}

/// Closed union of event kinds, discriminated by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Emitted once on the new channel to confirm establishment.
    Connection { message: String },
    /// Periodic keepalive; no payload beyond the envelope.
    Heartbeat,
    ChatMessage { data: ChatMessagePayload },
    MessageRead { data: MessageReadPayload },
    MatchNotification { data: MatchPayload },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    pub message_id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub message_type: MessageKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReadPayload {
    pub chat_id: String,
    pub read_by_id: String,
    pub last_read_message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPayload {
    pub match_id: String,
    pub other_user_id: String,
    pub other_user_name: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_wire_shape() {
        let event = NotificationEvent::new("u1", EventKind::Heartbeat);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "heartbeat");
        assert_eq!(json["userId"], "u1");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn chat_message_round_trip() {
        let event = NotificationEvent::new(
            "u2",
            EventKind::ChatMessage {
                data: ChatMessagePayload {
                    message_id: "m1".into(),
                    chat_id: "chat-1-2".into(),
                    sender_id: "u1".into(),
                    sender_name: "John".into(),
                    content: "hi".into(),
                    message_type: MessageKind::Text,
                },
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"chat_message\""));
        assert!(json.contains("\"senderName\":\"John\""));

        let parsed: NotificationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let line = r#"{"type":"presence_update","timestamp":"2026-01-01T00:00:00Z","userId":"u1"}"#;
        assert!(serde_json::from_str::<NotificationEvent>(line).is_err());
    }
}
