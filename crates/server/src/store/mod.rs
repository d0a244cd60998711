//! Access-controlled chat and message store.
//!
//! The store is the single authority over chat and message lifetimes. Every
//! chat lives behind its own lock, so mutations on one chat serialize while
//! distinct chats proceed concurrently; the outer map's write lock is the
//! atomic check-then-insert that keeps the unordered participant pair
//! unique. All operations take the resolved caller id and enforce two-party
//! membership before touching anything.

use std::collections::HashMap;
use std::sync::Arc;

use chatme_common::{Chat, Message, MessageKind};
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};

struct ChatState {
    chat: Chat,
    messages: Vec<Message>,
}

pub struct ChatStore {
    chats: RwLock<HashMap<String, Arc<RwLock<ChatState>>>>,
}

/// Canonical chat id for an unordered participant pair.
fn chat_id_for(a: &str, b: &str) -> String {
    if a <= b {
        format!("chat-{a}-{b}")
    } else {
        format!("chat-{b}-{a}")
    }
}

impl ChatStore {
    pub fn new() -> Self {
        Self {
            chats: RwLock::new(HashMap::new()),
        }
    }

    /// Chats the caller participates in, most recently active first.
    pub async fn list_chats(&self, caller_id: &str) -> Vec<Chat> {
        let chats = self.chats.read().await;
        let mut out = Vec::new();
        for state in chats.values() {
            let state = state.read().await;
            if state.chat.has_participant(caller_id) {
                out.push(state.chat.clone());
            }
        }
        drop(chats);

        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        out
    }

    /// Return the existing chat for the unordered pair, or create it.
    ///
    /// Safe under concurrent calls for the same pair from either direction:
    /// the insert happens under the map's write lock keyed by the canonical
    /// id, so exactly one chat exists afterwards.
    pub async fn get_or_create_chat(
        &self,
        caller_id: &str,
        other_id: &str,
    ) -> Result<(Chat, bool)> {
        if caller_id == other_id {
            return Err(Error::InvalidArgument(
                "cannot open a chat with yourself".into(),
            ));
        }

        let chat_id = chat_id_for(caller_id, other_id);

        {
            let chats = self.chats.read().await;
            if let Some(state) = chats.get(&chat_id) {
                return Ok((state.read().await.chat.clone(), false));
            }
        }

        let mut chats = self.chats.write().await;
        if let Some(state) = chats.get(&chat_id) {
            // Lost the race to a concurrent create for the same pair.
            return Ok((state.read().await.chat.clone(), false));
        }

        let chat = Chat {
            id: chat_id.clone(),
            participants: vec![caller_id.to_string(), other_id.to_string()],
            last_message: None,
            updated_at: Utc::now(),
        };
        chats.insert(
            chat_id.clone(),
            Arc::new(RwLock::new(ChatState {
                chat: chat.clone(),
                messages: Vec::new(),
            })),
        );

        info!("created chat {chat_id}");

        Ok((chat, true))
    }

    /// Membership-checked chat snapshot.
    pub async fn chat(&self, caller_id: &str, chat_id: &str) -> Result<Chat> {
        let handle = self.handle(chat_id).await?;
        let state = handle.read().await;
        if !state.chat.has_participant(caller_id) {
            return Err(Error::AccessDenied);
        }
        Ok(state.chat.clone())
    }

    /// All messages of a chat in ascending timestamp order, insertion order
    /// as tie-break.
    pub async fn list_messages(&self, caller_id: &str, chat_id: &str) -> Result<Vec<Message>> {
        let handle = self.handle(chat_id).await?;
        let state = handle.read().await;
        if !state.chat.has_participant(caller_id) {
            return Err(Error::AccessDenied);
        }
        Ok(state.messages.clone())
    }

    /// Append a message and advance the chat's `last_message`/`updated_at`.
    ///
    /// Returns the stored message together with a snapshot of the updated
    /// chat so the caller can fan out the notification without a second
    /// lookup.
    pub async fn send_message(
        &self,
        caller_id: &str,
        chat_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<(Message, Chat)> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidArgument("message content is empty".into()));
        }

        let handle = self.handle(chat_id).await?;
        let mut state = handle.write().await;
        if !state.chat.has_participant(caller_id) {
            return Err(Error::AccessDenied);
        }

        // Timestamps within a chat never go backwards, even if the wall
        // clock does; appends are serialized on this chat's lock.
        let mut now = Utc::now();
        if let Some(last) = state.messages.last() {
            if now < last.timestamp {
                now = last.timestamp;
            }
        }

        let message = Message {
            id: format!("msg-{}", Uuid::new_v4()),
            chat_id: chat_id.to_string(),
            sender_id: caller_id.to_string(),
            content: content.to_string(),
            timestamp: now,
            kind,
        };

        state.messages.push(message.clone());
        state.chat.last_message = Some(message.clone());
        if now > state.chat.updated_at {
            state.chat.updated_at = now;
        }

        Ok((message, state.chat.clone()))
    }

    /// Membership-checked message lookup, used for read receipts.
    pub async fn find_message(
        &self,
        caller_id: &str,
        chat_id: &str,
        message_id: &str,
    ) -> Result<(Message, Chat)> {
        let handle = self.handle(chat_id).await?;
        let state = handle.read().await;
        if !state.chat.has_participant(caller_id) {
            return Err(Error::AccessDenied);
        }
        let message = state
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .ok_or(Error::NotFound("message"))?;
        Ok((message, state.chat.clone()))
    }

    async fn handle(&self, chat_id: &str) -> Result<Arc<RwLock<ChatState>>> {
        self.chats
            .read()
            .await
            .get(chat_id)
            .cloned()
            .ok_or(Error::NotFound("chat"))
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_is_idempotent_across_directions() {
        let store = ChatStore::new();
        let (chat_a, created_a) = store.get_or_create_chat("u1", "u2").await.unwrap();
        let (chat_b, created_b) = store.get_or_create_chat("u2", "u1").await.unwrap();

        assert!(created_a);
        assert!(!created_b);
        assert_eq!(chat_a.id, chat_b.id);
        assert_eq!(chat_a.id, "chat-u1-u2");
        assert!(chat_a.has_participant("u1") && chat_a.has_participant("u2"));
    }

    #[tokio::test]
    async fn concurrent_creates_yield_one_chat() {
        let store = Arc::new(ChatStore::new());
        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    store.get_or_create_chat("u1", "u2").await.unwrap()
                } else {
                    store.get_or_create_chat("u2", "u1").await.unwrap()
                }
            }));
        }

        let mut created = 0;
        for task in tasks {
            let (chat, was_created) = task.await.unwrap();
            assert_eq!(chat.id, "chat-u1-u2");
            if was_created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.list_chats("u1").await.len(), 1);
    }

    #[tokio::test]
    async fn chat_with_self_is_rejected() {
        let store = ChatStore::new();
        assert!(matches!(
            store.get_or_create_chat("u1", "u1").await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn messages_keep_order_and_update_chat() {
        let store = ChatStore::new();
        let (chat, _) = store.get_or_create_chat("u1", "u2").await.unwrap();

        for i in 0..5 {
            let sender = if i % 2 == 0 { "u1" } else { "u2" };
            store
                .send_message(sender, &chat.id, &format!("msg {i}"), MessageKind::Text)
                .await
                .unwrap();
        }

        let messages = store.list_messages("u2", &chat.id).await.unwrap();
        assert_eq!(messages.len(), 5);
        for pair in messages.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        // Insertion order preserved as the tie-break.
        for (i, msg) in messages.iter().enumerate() {
            assert_eq!(msg.content, format!("msg {i}"));
        }

        let chats = store.list_chats("u1").await;
        assert_eq!(chats[0].last_message.as_ref().unwrap().content, "msg 4");
        assert!(chats[0].updated_at >= chat.updated_at);
    }

    #[tokio::test]
    async fn list_chats_orders_by_recent_activity() {
        let store = ChatStore::new();
        let (first, _) = store.get_or_create_chat("u1", "u2").await.unwrap();
        let (second, _) = store.get_or_create_chat("u1", "u3").await.unwrap();

        store
            .send_message("u1", &first.id, "make first most recent", MessageKind::Text)
            .await
            .unwrap();

        let chats = store.list_chats("u1").await;
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].id, first.id);
        assert_eq!(chats[1].id, second.id);

        assert!(store.list_chats("u4").await.is_empty());
    }

    #[tokio::test]
    async fn empty_content_is_rejected_and_not_stored() {
        let store = ChatStore::new();
        let (chat, _) = store.get_or_create_chat("u1", "u2").await.unwrap();

        for content in ["", "   ", "\n\t "] {
            assert!(matches!(
                store
                    .send_message("u1", &chat.id, content, MessageKind::Text)
                    .await,
                Err(Error::InvalidArgument(_))
            ));
        }

        assert!(store.list_messages("u1", &chat.id).await.unwrap().is_empty());
        let chats = store.list_chats("u1").await;
        assert!(chats[0].last_message.is_none());
    }

    #[tokio::test]
    async fn non_participant_is_denied() {
        let store = ChatStore::new();
        let (chat, _) = store.get_or_create_chat("u1", "u2").await.unwrap();

        assert!(matches!(
            store.list_messages("u3", &chat.id).await,
            Err(Error::AccessDenied)
        ));
        assert!(matches!(
            store
                .send_message("u3", &chat.id, "intruding", MessageKind::Text)
                .await,
            Err(Error::AccessDenied)
        ));
        assert!(matches!(
            store.chat("u3", &chat.id).await,
            Err(Error::AccessDenied)
        ));
    }

    #[tokio::test]
    async fn unknown_chat_is_not_found() {
        let store = ChatStore::new();
        assert!(matches!(
            store.list_messages("u1", "chat-x-y").await,
            Err(Error::NotFound("chat"))
        ));
        assert!(matches!(
            store
                .send_message("u1", "chat-x-y", "hello", MessageKind::Text)
                .await,
            Err(Error::NotFound("chat"))
        ));
    }

    #[tokio::test]
    async fn find_message_checks_membership_and_existence() {
        let store = ChatStore::new();
        let (chat, _) = store.get_or_create_chat("u1", "u2").await.unwrap();
        let (sent, _) = store
            .send_message("u1", &chat.id, "hi", MessageKind::Text)
            .await
            .unwrap();

        let (found, _) = store.find_message("u2", &chat.id, &sent.id).await.unwrap();
        assert_eq!(found, sent);

        assert!(matches!(
            store.find_message("u2", &chat.id, "msg-missing").await,
            Err(Error::NotFound("message"))
        ));
        assert!(matches!(
            store.find_message("u3", &chat.id, &sent.id).await,
            Err(Error::AccessDenied)
        ));
    }
}
