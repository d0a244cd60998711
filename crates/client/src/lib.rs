//! Reconnecting consumer of the ChatMe notification stream.
//!
//! Holds one long-lived connection to the server's push endpoint, parses
//! the newline-delimited event objects and dispatches them by type to
//! registered subscribers. On any transport failure it schedules exactly
//! one reconnection attempt after a fixed delay; losing the identity
//! (logout) cancels the pending attempt and parks the listener until a new
//! identity appears.

use std::time::Duration;

use bytes::BytesMut;
use chatme_common::{ChatMessagePayload, EventKind, MatchPayload, MessageReadPayload, NotificationEvent};
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Fixed delay before the single reconnection attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Why a stream attempt stopped without a transport error.
enum StreamEnd {
    /// Server closed the stream; retry after the fixed delay.
    Eof,
    /// Identity went away mid-session; no retry until it comes back.
    IdentityLost,
    /// The token source is gone; shut the listener down.
    SourceClosed,
}

type Callback<T> = Box<dyn Fn(T) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    chat_message: Option<Callback<ChatMessagePayload>>,
    message_read: Option<Callback<MessageReadPayload>>,
    match_notification: Option<Callback<MatchPayload>>,
}

pub struct NotificationListenerBuilder {
    base_url: String,
    reconnect_delay: Duration,
    subscribers: Subscribers,
}

impl NotificationListenerBuilder {
    pub fn on_chat_message<F>(mut self, f: F) -> Self
    where
        F: Fn(ChatMessagePayload) + Send + Sync + 'static,
    {
        self.subscribers.chat_message = Some(Box::new(f));
        self
    }

    pub fn on_message_read<F>(mut self, f: F) -> Self
    where
        F: Fn(MessageReadPayload) + Send + Sync + 'static,
    {
        self.subscribers.message_read = Some(Box::new(f));
        self
    }

    pub fn on_match_notification<F>(mut self, f: F) -> Self
    where
        F: Fn(MatchPayload) + Send + Sync + 'static,
    {
        self.subscribers.match_notification = Some(Box::new(f));
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Finish the builder. `token` carries the caller's credential and
    /// doubles as the identity signal: `None` means logged out.
    pub fn build(
        self,
        token: watch::Receiver<Option<String>>,
    ) -> (NotificationListener, watch::Receiver<ChannelState>) {
        let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);
        (
            NotificationListener {
                base_url: self.base_url,
                http: reqwest::Client::new(),
                token,
                subscribers: self.subscribers,
                state_tx,
                reconnect_delay: self.reconnect_delay,
            },
            state_rx,
        )
    }
}

pub struct NotificationListener {
    base_url: String,
    http: reqwest::Client,
    token: watch::Receiver<Option<String>>,
    subscribers: Subscribers,
    state_tx: watch::Sender<ChannelState>,
    reconnect_delay: Duration,
}

impl NotificationListener {
    pub fn builder(base_url: impl Into<String>) -> NotificationListenerBuilder {
        NotificationListenerBuilder {
            base_url: base_url.into(),
            reconnect_delay: RECONNECT_DELAY,
            subscribers: Subscribers::default(),
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drive the state machine until the token source is dropped.
    pub async fn run(mut self) {
        loop {
            // Wait for an identity.
            let token = loop {
                let current = self.token.borrow_and_update().clone();
                if let Some(token) = current {
                    break token;
                }
                self.set_state(ChannelState::Disconnected);
                if self.token.changed().await.is_err() {
                    return;
                }
            };

            self.set_state(ChannelState::Connecting);
            match self.consume_stream(&token).await {
                Ok(StreamEnd::SourceClosed) => {
                    self.set_state(ChannelState::Disconnected);
                    return;
                }
                Ok(StreamEnd::IdentityLost) => {
                    debug!("identity lost, parking notification listener");
                    self.set_state(ChannelState::Disconnected);
                    continue;
                }
                Ok(StreamEnd::Eof) => debug!("notification stream ended"),
                Err(e) => warn!("notification stream failed: {e}"),
            }
            self.set_state(ChannelState::Disconnected);

            // Exactly one reconnection attempt per drop. Logging out during
            // the delay cancels the timer instead of leaking an attempt.
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                closed = identity_lost(&mut self.token) => {
                    if closed {
                        return;
                    }
                }
            }
        }
    }

    async fn consume_stream(&mut self, token: &str) -> Result<StreamEnd, ClientError> {
        let url = format!(
            "{}/api/notifications/stream",
            self.base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;

        self.set_state(ChannelState::Connected);
        debug!("notification stream established");

        let mut stream = response.bytes_stream();
        let mut buf = BytesMut::new();
        let mut token_rx = self.token.clone();

        loop {
            tokio::select! {
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        buf.extend_from_slice(&bytes);
                        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                            let line = buf.split_to(pos + 1);
                            self.handle_line(&line[..line.len() - 1]);
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(StreamEnd::Eof),
                },
                closed = identity_lost(&mut token_rx) => {
                    return Ok(if closed {
                        StreamEnd::SourceClosed
                    } else {
                        StreamEnd::IdentityLost
                    });
                }
            }
        }
    }

    /// Parse one wire line. Malformed payloads and unknown event types are
    /// logged and dropped; they never terminate the connection.
    fn handle_line(&self, line: &[u8]) {
        let line = match line.last() {
            Some(b'\r') => &line[..line.len() - 1],
            _ => line,
        };
        if line.is_empty() {
            return;
        }

        match serde_json::from_slice::<NotificationEvent>(line) {
            Ok(event) => self.dispatch(event),
            Err(e) => debug!("dropping unrecognized notification event: {e}"),
        }
    }

    fn dispatch(&self, event: NotificationEvent) {
        match event.kind {
            // Handled internally, not exposed to subscribers.
            EventKind::Connection { .. } => debug!("notification channel confirmed"),
            EventKind::Heartbeat => {}
            EventKind::ChatMessage { data } => {
                if let Some(cb) = &self.subscribers.chat_message {
                    cb(data);
                }
            }
            EventKind::MessageRead { data } => {
                if let Some(cb) = &self.subscribers.message_read {
                    cb(data);
                }
            }
            EventKind::MatchNotification { data } => {
                if let Some(cb) = &self.subscribers.match_notification {
                    cb(data);
                }
            }
        }
    }

    fn set_state(&self, state: ChannelState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

/// Resolves when the identity goes away. Returns `true` when the token
/// source itself is gone (shutdown).
async fn identity_lost(rx: &mut watch::Receiver<Option<String>>) -> bool {
    loop {
        if rx.changed().await.is_err() {
            return true;
        }
        if rx.borrow_and_update().is_none() {
            return false;
        }
    }
}
