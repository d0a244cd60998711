//! ChatMe shared wire types
//!
//! Types exchanged between the server and its clients: chat/message
//! entities and the live notification event union. Field names follow the
//! JSON wire format (camelCase) consumed by the frontends.

pub mod events;
pub mod types;

pub use events::{
    ChatMessagePayload, EventKind, MatchPayload, MessageReadPayload, NotificationEvent,
};
pub use types::{Chat, Message, MessageKind, UserInfo};
