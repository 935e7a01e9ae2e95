//! Tracks which live connections are currently subscribed to which forum.
//!
//! The registry is the sole owner of membership state. It is process-local
//! and in-memory; nothing here survives a restart. A connection is in at
//! most one forum at a time: joining a second forum moves it.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::ServerEvent;

pub type ConnId = Uuid;

/// Per-connection delivery channel. Unbounded so a stalled socket can never
/// block a publisher; the forwarding task drains it at its own pace.
pub type DeliverySender = mpsc::UnboundedSender<std::sync::Arc<ServerEvent>>;

#[derive(Default)]
struct Inner {
    members: HashMap<i64, HashMap<ConnId, DeliverySender>>,
    joined: HashMap<ConnId, i64>,
}

#[derive(Default)]
pub struct RoomRegistry {
    inner: Mutex<Inner>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent. Subscribes the connection to `forum_id`, moving it out of
    /// any forum it was previously in.
    pub fn join(&self, conn: ConnId, forum_id: i64, sender: DeliverySender) {
        let mut inner = self.lock();

        if let Some(previous) = inner.joined.insert(conn, forum_id) {
            if previous != forum_id {
                remove_member(&mut inner.members, previous, conn);
            }
        }

        inner.members.entry(forum_id).or_default().insert(conn, sender);
    }

    /// Idempotent; a connection that is not in `forum_id` is a no-op.
    pub fn leave(&self, conn: ConnId, forum_id: i64) {
        let mut inner = self.lock();

        if inner.joined.get(&conn) == Some(&forum_id) {
            inner.joined.remove(&conn);
            remove_member(&mut inner.members, forum_id, conn);
        }
    }

    /// Drops the connection from whatever forum it was in. Never fails.
    pub fn on_disconnect(&self, conn: ConnId) {
        let mut inner = self.lock();

        if let Some(forum_id) = inner.joined.remove(&conn) {
            remove_member(&mut inner.members, forum_id, conn);
        }
    }

    /// Snapshot of the forum's current members. Unknown forums have no
    /// members, which is not an error.
    pub fn members_of(&self, forum_id: i64) -> Vec<(ConnId, DeliverySender)> {
        self.lock()
            .members
            .get(&forum_id)
            .map(|members| {
                members
                    .iter()
                    .map(|(conn, sender)| (*conn, sender.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn joined_forum(&self, conn: ConnId) -> Option<i64> {
        self.lock().joined.get(&conn).copied()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn remove_member(members: &mut HashMap<i64, HashMap<ConnId, DeliverySender>>, forum_id: i64, conn: ConnId) {
    if let Some(forum_members) = members.get_mut(&forum_id) {
        forum_members.remove(&conn);
        if forum_members.is_empty() {
            members.remove(&forum_id);
        }
    }
}
