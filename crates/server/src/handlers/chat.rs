//! Chat handlers.
//!
//! Every handler takes the caller context resolved by the auth middleware;
//! the store enforces two-party membership. Successful mutations fan their
//! event out to the *other* participant's channel, never the sender's.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chatme_common::{
    Chat, ChatMessagePayload, EventKind, Message, MessageKind, MessageReadPayload,
    NotificationEvent,
};
use serde::Deserialize;
use tracing::info;

use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub participant_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub last_read_message_id: String,
}

/// GET /api/chats
pub async fn list_chats(ctx: Ctx, State(state): State<AppState>) -> Json<Vec<Chat>> {
    Json(state.store.list_chats(ctx.user_id()).await)
}

/// POST /api/chats/create
///
/// Lazily opens the chat on first contact; a second call for the same pair,
/// from either side, returns the existing chat unchanged.
pub async fn create_chat(
    ctx: Ctx,
    State(state): State<AppState>,
    Json(req): Json<CreateChatRequest>,
) -> Result<Json<Chat>> {
    info!("POST /api/chats/create - {} -> {}", ctx.user_id(), req.participant_id);

    // Unknown counterpart is an explicit NotFound, not a dangling chat.
    state.users.get(&req.participant_id)?;

    let (chat, _created) = state
        .store
        .get_or_create_chat(ctx.user_id(), &req.participant_id)
        .await?;
    Ok(Json(chat))
}

/// GET /api/chats/{chat_id}
pub async fn get_chat(
    ctx: Ctx,
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Chat>> {
    Ok(Json(state.store.chat(ctx.user_id(), &chat_id).await?))
}

/// GET /api/chats/{chat_id}/messages
pub async fn list_messages(
    ctx: Ctx,
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Message>>> {
    Ok(Json(state.store.list_messages(ctx.user_id(), &chat_id).await?))
}

/// POST /api/chats/{chat_id}/messages
pub async fn send_message(
    ctx: Ctx,
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Message>> {
    let (message, chat) = state
        .store
        .send_message(ctx.user_id(), &chat_id, &req.content, req.kind)
        .await?;

    info!("message {} sent in chat {}", message.id, chat_id);

    for recipient in chat.participants.iter().filter(|p| *p != ctx.user_id()) {
        state.broker.publish(NotificationEvent::new(
            recipient.clone(),
            EventKind::ChatMessage {
                data: ChatMessagePayload {
                    message_id: message.id.clone(),
                    chat_id: message.chat_id.clone(),
                    sender_id: message.sender_id.clone(),
                    sender_name: ctx.display_name().to_string(),
                    content: message.content.clone(),
                    message_type: message.kind,
                },
            },
        ));
    }

    Ok(Json(message))
}

/// POST /api/chats/{chat_id}/read
///
/// Read receipts carry no stored state; the other participant just gets a
/// `message_read` event if currently connected.
pub async fn mark_read(
    ctx: Ctx,
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<MarkReadRequest>,
) -> Result<StatusCode> {
    let (message, chat) = state
        .store
        .find_message(ctx.user_id(), &chat_id, &req.last_read_message_id)
        .await?;

    if let Some(other) = chat.other_participant(ctx.user_id()) {
        state.broker.publish(NotificationEvent::new(
            other,
            EventKind::MessageRead {
                data: MessageReadPayload {
                    chat_id,
                    read_by_id: ctx.user_id().to_string(),
                    last_read_message_id: message.id,
                },
            },
        ));
    }

    Ok(StatusCode::OK)
}
