//! Status-change fan-out to live dashboard subscribers
//!
//! Delivery is at-most-once and best-effort: `publish` never blocks, a full
//! subscriber buffer drops the event, and there is no durable queue. An event
//! is a cue to re-query the projection layer, not a source of truth — a
//! subscriber that misses one re-fetches current state and has lost nothing.

use crate::product::TimeStamp;
use crate::request::{RequestKind, RequestStatus};
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Mutex;
use std::time::Duration;

pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// One status change on one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub request_id: String,
    pub kind: RequestKind,
    pub old_status: RequestStatus,
    pub new_status: RequestStatus,
    pub actor: String,
    pub at: TimeStamp<Utc>,
}

pub struct EventBroadcaster {
    subscribers: Mutex<Vec<Sender<StatusEvent>>>,
    buffer: usize,
}

impl EventBroadcaster {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            buffer,
        }
    }

    /// Register a listener. The subscription lives until dropped; a dropped
    /// subscriber is pruned from the registry on the next publish.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = bounded(self.buffer);
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        Subscription { receiver: rx }
    }

    /// Fan the event out to every live subscriber. Uses `try_send` so the
    /// workflow hot path never blocks on a slow dashboard.
    pub fn publish(&self, event: &StatusEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    request_id = %event.request_id,
                    "subscriber buffer full, dropping status event"
                );
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

pub struct Subscription {
    receiver: Receiver<StatusEvent>,
}

impl Subscription {
    pub fn try_recv(&self) -> Option<StatusEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<StatusEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Drain everything currently buffered without blocking.
    pub fn drain(&self) -> Vec<StatusEvent> {
        self.receiver.try_iter().collect()
    }
}
