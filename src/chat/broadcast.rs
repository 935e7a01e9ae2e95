//! Fans an event out to every current member of a forum.
//!
//! Delivery is fire-and-forget per connection: a member whose channel has
//! closed is logged and skipped, and the registry reconciles when that
//! connection's socket task winds down. Publishes to the same forum are
//! serialized, so all members observe them in the same relative order.
//! Ordering across forums is not defined.

use std::sync::{Arc, Mutex, PoisonError};

use super::events::ServerEvent;
use super::registry::RoomRegistry;

#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<RoomRegistry>,
    fanout: Arc<Mutex<()>>,
}

impl Broadcaster {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            registry,
            fanout: Arc::new(Mutex::new(())),
        }
    }

    /// Delivers `event` to every member of `forum_id` at the instant of the
    /// call. Returns how many members the event was handed to; delivery
    /// failures never propagate.
    pub fn publish(&self, forum_id: i64, event: ServerEvent) -> usize {
        let event = Arc::new(event);
        let _serialized = self.fanout.lock().unwrap_or_else(PoisonError::into_inner);

        let mut delivered = 0;
        for (conn, sender) in self.registry.members_of(forum_id) {
            if sender.send(event.clone()).is_err() {
                tracing::debug!(forum_id, conn = %conn, "member channel closed, skipping delivery");
                continue;
            }
            delivered += 1;
        }

        delivered
    }
}
