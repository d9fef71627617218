//! Subscription Bus - live fan-out of appended messages
//!
//! Purely in-memory, process-local routing state. Delivery is best-effort to
//! currently-connected subscribers; anyone not connected at publish time
//! reconciles by refetching from the Message Log with its last-known
//! sequence number.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use tradeyard_core::Message;

/// Per-subscriber queue depth. A subscriber that falls this far behind
/// loses pushes and must reconcile from the log.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// Fan-out hub for room message streams
#[derive(Default)]
pub struct SubscriptionBus {
    rooms: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::Sender<Message>>>>,
}

impl SubscriptionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a live message stream for (room, subscriber).
    ///
    /// Re-subscribing with the same pair replaces the previous channel;
    /// the stale receiver closes on its next recv.
    pub fn subscribe(&self, room_id: Uuid, subscriber_id: Uuid) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut rooms = self.rooms.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        rooms.entry(room_id).or_default().insert(subscriber_id, tx);
        debug!(%room_id, %subscriber_id, "Subscriber attached");
        rx
    }

    /// Detach a subscriber. Idempotent and safe from any task, including a
    /// disconnect callback racing an explicit unsubscribe.
    pub fn unsubscribe(&self, room_id: Uuid, subscriber_id: Uuid) {
        let mut rooms = self.rooms.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(subscribers) = rooms.get_mut(&room_id) {
            if subscribers.remove(&subscriber_id).is_some() {
                debug!(%room_id, %subscriber_id, "Subscriber detached");
            }
            if subscribers.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    /// Deliver a message to every live subscriber of its room.
    ///
    /// A full queue drops that delivery (the subscriber refetches); a closed
    /// channel prunes the subscriber. Failures never reach the publisher.
    pub fn publish(&self, message: &Message) {
        let mut rooms = self.rooms.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(subscribers) = rooms.get_mut(&message.room_id) else {
            return;
        };

        subscribers.retain(|subscriber_id, tx| match tx.try_send(message.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(%subscriber_id, seq = message.seq, "Subscriber queue full, dropping push");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(%subscriber_id, "Subscriber gone, pruning");
                false
            }
        });

        if subscribers.is_empty() {
            rooms.remove(&message.room_id);
        }
    }

    /// Number of live subscribers for a room
    pub fn subscriber_count(&self, room_id: Uuid) -> usize {
        self.rooms
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&room_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}
