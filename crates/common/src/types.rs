use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single direct message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
}

/// A two-party chat. `participants` always holds exactly two user ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub participants: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// True if `user_id` is one of the two participants.
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// The participant other than `user_id`, if any.
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.as_str() != user_id)
            .map(String::as_str)
    }
}

/// Public user info (no credentials).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_wire_names() {
        assert_eq!(serde_json::to_string(&MessageKind::Text).unwrap(), "\"text\"");
        assert_eq!(serde_json::to_string(&MessageKind::File).unwrap(), "\"file\"");
    }

    #[test]
    fn message_serializes_camel_case() {
        let msg = Message {
            id: "msg-1".into(),
            chat_id: "chat-1-2".into(),
            sender_id: "1".into(),
            content: "hi".into(),
            timestamp: Utc::now(),
            kind: MessageKind::Text,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["chatId"], "chat-1-2");
        assert_eq!(json["senderId"], "1");
        assert_eq!(json["type"], "text");
    }

    #[test]
    fn chat_other_participant() {
        let chat = Chat {
            id: "chat-1-2".into(),
            participants: vec!["1".into(), "2".into()],
            last_message: None,
            updated_at: Utc::now(),
        };
        assert_eq!(chat.other_participant("1"), Some("2"));
        assert_eq!(chat.other_participant("2"), Some("1"));
        assert_eq!(chat.other_participant("3"), None);
        assert!(chat.has_participant("1"));
        assert!(!chat.has_participant("3"));
    }
}
