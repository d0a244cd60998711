//! Live notification push stream.
//!
//! One long-lived connection per user id. Events go out as
//! newline-delimited JSON objects; the client reconnects on its own when
//! the transport drops.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
};
use tracing::{info, warn};

use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::{Error, Result};
use crate::notify::NotificationBroker;

/// Removes the broker registration when the response stream is dropped.
/// Epoch-guarded: a connection that has already been superseded must not
/// tear down its successor's channel.
struct StreamGuard {
    broker: Arc<NotificationBroker>,
    user_id: String,
    epoch: u64,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.broker.disconnect_epoch(&self.user_id, self.epoch);
    }
}

/// GET /api/notifications/stream
pub async fn notification_stream(ctx: Ctx, State(state): State<AppState>) -> Result<Response> {
    let user_id = ctx.user_id().to_string();
    if state.broker.is_connected(&user_id) {
        info!("replacing existing notification stream for {user_id}");
    }
    let (mut rx, epoch) = state.broker.connect(&user_id);

    info!("notification stream opened for {user_id}");

    let guard = StreamGuard {
        broker: state.broker.clone(),
        user_id,
        epoch,
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => yield Ok::<_, Infallible>(format!("{json}\n")),
                Err(e) => warn!("failed to encode notification event: {e}"),
            }
        }
        // Sender gone: superseded by a newer connection for this user.
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(|e| Error::Transport(format!("failed to build stream response: {e}")))
}
