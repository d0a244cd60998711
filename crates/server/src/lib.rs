//! ChatMe Messaging Server Library
//!
//! Session-authenticated direct messaging with live delivery notifications:
//! a token-verification gateway, an access-controlled chat/message store and
//! a per-user notification push stream.

pub mod auth;
pub mod config;
pub mod ctx;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod store;
pub mod users;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use auth::middleware::mw_require_auth;
use config::{AppState, ServerConfig};
use handlers::{
    create_chat,
    get_chat,
    get_user,
    // Chats
    list_chats,
    list_messages,
    list_users,
    login,
    logout,
    mark_read,
    me,
    // Live push
    notification_stream,
    send_message,
    // Auth
    signup,
    verify_identity,
};

/// Build the full router over the given state. Exposed so tests can drive
/// the HTTP surface without binding a listener.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health_check))
        // Gateway verification contract (reverse-proxy forward auth)
        .route("/auth/verify", get(verify_identity))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout));

    let protected = Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/users", get(list_users))
        .route("/api/users/{user_id}", get(get_user))
        .route("/api/chats", get(list_chats))
        .route("/api/chats/create", post(create_chat))
        .route("/api/chats/{chat_id}", get(get_chat))
        .route(
            "/api/chats/{chat_id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/api/chats/{chat_id}/read", post(mark_read))
        .route("/api/notifications/stream", get(notification_stream))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            mw_require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already set, ignore
    }

    info!("=== ChatMe Server ===");

    let config = ServerConfig::from_env();
    info!("Listening on {}", config.bind_addr);
    info!(
        "Heartbeat interval: {}s",
        config.heartbeat_interval.as_secs()
    );

    let state = AppState::new(config.clone());

    // Heartbeats let the transport notice dead connections.
    tokio::spawn(
        state
            .broker
            .clone()
            .heartbeat_loop(config.heartbeat_interval),
    );

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "server": "chatme-server",
        "timestamp": Utc::now(),
    }))
}
