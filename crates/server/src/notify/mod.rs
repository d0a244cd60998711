//! Per-user live notification channels.
//!
//! The broker keeps at most one outbound channel per connected user id and
//! delivers events to the matching recipient only. Delivery is best-effort,
//! at-most-once: no queue for absent users, no retry, no replay after a
//! reconnect. A disconnected recipient learns of changes on its next read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatme_common::{EventKind, NotificationEvent};
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

struct UserChannel {
    tx: mpsc::Sender<NotificationEvent>,
    epoch: u64,
}

pub struct NotificationBroker {
    channels: RwLock<HashMap<String, UserChannel>>,
    capacity: usize,
    next_epoch: AtomicU64,
}

impl NotificationBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            next_epoch: AtomicU64::new(1),
        }
    }

    /// Register a channel for `user_id`, superseding any existing one.
    ///
    /// The old sender is dropped inside the table's write lock, so there is
    /// never an instant with two live channels for one user. A `connection`
    /// event is already queued on the returned receiver.
    pub fn connect(&self, user_id: &str) -> (mpsc::Receiver<NotificationEvent>, u64) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);

        // The channel is empty and capacity is at least one.
        let _ = tx.try_send(NotificationEvent::new(
            user_id,
            EventKind::Connection {
                message: "notification channel established".to_string(),
            },
        ));

        let old = self
            .channels
            .write()
            .insert(user_id.to_string(), UserChannel { tx, epoch });
        if old.is_some() {
            debug!("superseded notification channel for {user_id}");
        }

        (rx, epoch)
    }

    /// Close and remove the channel if present; no-op otherwise.
    pub fn disconnect(&self, user_id: &str) {
        if self.channels.write().remove(user_id).is_some() {
            debug!("closed notification channel for {user_id}");
        }
    }

    /// Like [`disconnect`](Self::disconnect), but only if the channel still
    /// belongs to the connection identified by `epoch`. Stream teardown uses
    /// this so it never removes a channel that superseded it.
    pub fn disconnect_epoch(&self, user_id: &str, epoch: u64) {
        let mut channels = self.channels.write();
        if channels.get(user_id).is_some_and(|c| c.epoch == epoch) {
            channels.remove(user_id);
            debug!("closed notification channel for {user_id} (epoch {epoch})");
        }
    }

    pub fn is_connected(&self, user_id: &str) -> bool {
        self.channels.read().contains_key(user_id)
    }

    /// Deliver an event to its recipient's channel, if one is open.
    ///
    /// Never blocks and never retries: with no channel the event is dropped
    /// silently, a full channel drops the event, and a closed channel is
    /// torn down.
    pub fn publish(&self, event: NotificationEvent) {
        let recipient = event.user_id.clone();

        let attempt = {
            let channels = self.channels.read();
            match channels.get(&recipient) {
                None => return,
                Some(channel) => (channel.tx.try_send(event), channel.epoch),
            }
        };

        match attempt {
            (Ok(()), _) => {}
            (Err(TrySendError::Full(_)), _) => {
                warn!("notification channel for {recipient} is full, dropping event");
            }
            (Err(TrySendError::Closed(_)), epoch) => {
                self.disconnect_epoch(&recipient, epoch);
            }
        }
    }

    /// Emit heartbeats on every open channel at a fixed interval, forever.
    /// Spawned once at startup; channels whose receiver is gone get removed.
    pub async fn heartbeat_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.send_heartbeats();
        }
    }

    fn send_heartbeats(&self) {
        let targets: Vec<(String, u64, mpsc::Sender<NotificationEvent>)> = self
            .channels
            .read()
            .iter()
            .map(|(user, channel)| (user.clone(), channel.epoch, channel.tx.clone()))
            .collect();

        for (user, epoch, tx) in targets {
            match tx.try_send(NotificationEvent::new(&user, EventKind::Heartbeat)) {
                Ok(()) => {}
                // Behind on reads; the next tick will try again.
                Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => self.disconnect_epoch(&user, epoch),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatme_common::ChatMessagePayload;
    use chatme_common::MessageKind;

    fn chat_message(recipient: &str, content: &str) -> NotificationEvent {
        NotificationEvent::new(
            recipient,
            EventKind::ChatMessage {
                data: ChatMessagePayload {
                    message_id: "m1".into(),
                    chat_id: "chat-a-b".into(),
                    sender_id: "a".into(),
                    sender_name: "A".into(),
                    content: content.into(),
                    message_type: MessageKind::Text,
                },
            },
        )
    }

    #[tokio::test]
    async fn connect_queues_connection_event() {
        let broker = NotificationBroker::new(8);
        let (mut rx, _) = broker.connect("u1");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.user_id, "u1");
        assert!(matches!(event.kind, EventKind::Connection { .. }));
        assert!(broker.is_connected("u1"));
    }

    #[tokio::test]
    async fn second_connect_supersedes_first() {
        let broker = NotificationBroker::new(8);
        let (mut rx1, _) = broker.connect("u1");
        let (mut rx2, _) = broker.connect("u1");

        // Drain the greeting from the old channel; it must then be closed.
        assert!(rx1.recv().await.is_some());
        assert!(rx1.recv().await.is_none());

        broker.publish(chat_message("u1", "after reconnect"));
        assert!(matches!(
            rx2.recv().await.unwrap().kind,
            EventKind::Connection { .. }
        ));
        let delivered = rx2.recv().await.unwrap();
        assert!(matches!(delivered.kind, EventKind::ChatMessage { .. }));
    }

    #[tokio::test]
    async fn publish_without_channel_drops_silently() {
        let broker = NotificationBroker::new(8);
        broker.publish(chat_message("nobody", "into the void"));

        // A later connect must not see the earlier event.
        let (mut rx, _) = broker.connect("nobody");
        assert!(matches!(
            rx.recv().await.unwrap().kind,
            EventKind::Connection { .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_receiver_disconnects_on_publish() {
        let broker = NotificationBroker::new(8);
        let (rx, _) = broker.connect("u1");
        drop(rx);

        broker.publish(chat_message("u1", "write to broken channel"));
        assert!(!broker.is_connected("u1"));
    }

    #[tokio::test]
    async fn full_channel_drops_event_but_stays_connected() {
        let broker = NotificationBroker::new(1);
        // Capacity one is taken by the connection greeting.
        let (_rx, _) = broker.connect("u1");

        broker.publish(chat_message("u1", "overflow"));
        assert!(broker.is_connected("u1"));
    }

    #[tokio::test]
    async fn epoch_disconnect_spares_newer_channel() {
        let broker = NotificationBroker::new(8);
        let (_rx1, epoch1) = broker.connect("u1");
        let (_rx2, _epoch2) = broker.connect("u1");

        // Teardown of the superseded stream must not touch the new channel.
        broker.disconnect_epoch("u1", epoch1);
        assert!(broker.is_connected("u1"));
    }

    #[tokio::test]
    async fn heartbeats_reach_open_channels_and_prune_dead_ones() {
        let broker = NotificationBroker::new(8);
        let (mut rx_live, _) = broker.connect("live");
        let (rx_dead, _) = broker.connect("dead");
        drop(rx_dead);

        broker.send_heartbeats();

        assert!(matches!(
            rx_live.recv().await.unwrap().kind,
            EventKind::Connection { .. }
        ));
        assert!(matches!(
            rx_live.recv().await.unwrap().kind,
            EventKind::Heartbeat
        ));
        assert!(!broker.is_connected("dead"));
        assert!(broker.is_connected("live"));
    }
}
