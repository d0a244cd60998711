//! HTTP handlers for the ChatMe server.

pub mod auth;
pub mod chat;
pub mod notifications;
pub mod users;

// Re-export AppState from config
pub use crate::config::AppState;

// Auth handlers
pub use auth::{login, logout, me, signup, verify_identity};

// Chat handlers
pub use chat::{create_chat, get_chat, list_chats, list_messages, mark_read, send_message};

// Live notification push stream
pub use notifications::notification_stream;

// User directory
pub use users::{get_user, list_users};
