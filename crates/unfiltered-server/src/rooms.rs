//! Real-time channel rooms.
//!
//! A room is the in-memory set of live connections subscribed to a channel.
//! Rooms route events only; who may join is decided before [`ChannelRooms::join`]
//! is called. Nothing here survives a restart.
//!
//! Join, leave and publish on one channel serialize on that channel's map
//! shard, so a publish always sees a complete membership set. Channels in
//! different shards never contend.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use unfiltered_shared::protocol::ServerEvent;
use unfiltered_shared::{ChannelId, UserId};

pub type ConnectionId = Uuid;

/// Routing handle for one live connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: UserId,
    tx: mpsc::Sender<Arc<ServerEvent>>,
}

impl Connection {
    /// Create a handle plus the receiver the transport drains.
    pub fn open(user_id: UserId, buffer: usize) -> (Self, mpsc::Receiver<Arc<ServerEvent>>) {
        let (tx, rx) = mpsc::channel(buffer);
        let conn = Self {
            id: Uuid::new_v4(),
            user_id,
            tx,
        };
        (conn, rx)
    }

    /// Queue an event for this connection only. Never waits.
    pub fn notify(&self, event: ServerEvent) -> bool {
        self.tx.try_send(Arc::new(event)).is_ok()
    }

    /// Resolves once the transport has dropped the receiving side.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

#[derive(Default)]
struct Room {
    members: HashMap<ConnectionId, mpsc::Sender<Arc<ServerEvent>>>,
}

/// Outcome of a publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Members whose queue was full or closed. They catch up from history.
    pub failed: Vec<ConnectionId>,
}

impl DeliveryReport {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Channel id -> joined connections, plus the reverse index used to purge a
/// connection on disconnect.
#[derive(Default)]
pub struct ChannelRooms {
    rooms: DashMap<ChannelId, Room>,
    memberships: DashMap<ConnectionId, HashSet<ChannelId>>,
}

impl ChannelRooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` to the channel's room. Idempotent; returns whether the
    /// connection was newly added.
    pub fn join(&self, conn: &Connection, channel_id: &ChannelId) -> bool {
        // Room entry before index entry, in every path that touches both.
        let mut room = self.rooms.entry(channel_id.clone()).or_default();
        let added = room.members.insert(conn.id, conn.tx.clone()).is_none();
        self.memberships
            .entry(conn.id)
            .or_default()
            .insert(channel_id.clone());
        let participants = room.members.len();
        drop(room);

        if added {
            info!(
                channel = %channel_id,
                connection = %conn.id,
                participants,
                "Connection joined room"
            );
        }
        added
    }

    /// Remove `conn_id` from one room. Empty rooms are dropped.
    pub fn leave(&self, conn_id: &ConnectionId, channel_id: &ChannelId) -> bool {
        let removed = match self.rooms.entry(channel_id.clone()) {
            Entry::Occupied(mut room) => {
                let removed = room.get_mut().members.remove(conn_id).is_some();
                if let Some(mut channels) = self.memberships.get_mut(conn_id) {
                    channels.remove(channel_id);
                }
                self.memberships
                    .remove_if(conn_id, |_, channels| channels.is_empty());
                if room.get().members.is_empty() {
                    room.remove();
                    debug!(channel = %channel_id, "Removed empty room");
                }
                removed
            }
            Entry::Vacant(_) => false,
        };

        if removed {
            debug!(channel = %channel_id, connection = %conn_id, "Connection left room");
        }
        removed
    }

    /// Remove `conn_id` from every room it occupies. Returns the number of
    /// rooms left.
    pub fn leave_all(&self, conn_id: &ConnectionId) -> usize {
        let Some((_, channels)) = self.memberships.remove(conn_id) else {
            return 0;
        };

        let mut left = 0;
        for channel_id in &channels {
            if self.remove_from_room(conn_id, channel_id) {
                left += 1;
            }
        }

        debug!(connection = %conn_id, rooms = left, "Connection purged from all rooms");
        left
    }

    fn remove_from_room(&self, conn_id: &ConnectionId, channel_id: &ChannelId) -> bool {
        match self.rooms.entry(channel_id.clone()) {
            Entry::Occupied(mut room) => {
                let removed = room.get_mut().members.remove(conn_id).is_some();
                if room.get().members.is_empty() {
                    room.remove();
                    debug!(channel = %channel_id, "Removed empty room");
                }
                removed
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Deliver `event` to every connection currently in the channel's room.
    ///
    /// Callers publish only after the message is durably stored. Delivery is
    /// best effort and at most once per member: a full or closed queue is
    /// skipped and reported, never retried.
    pub fn publish(&self, channel_id: &ChannelId, event: ServerEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let Some(room) = self.rooms.get(channel_id) else {
            debug!(channel = %channel_id, "Publish to empty channel");
            return report;
        };

        let event = Arc::new(event);
        for (conn_id, tx) in &room.members {
            match tx.try_send(Arc::clone(&event)) {
                Ok(()) => report.delivered += 1,
                Err(_) => report.failed.push(*conn_id),
            }
        }
        drop(room);

        if report.is_partial() {
            warn!(
                channel = %channel_id,
                delivered = report.delivered,
                failed = report.failed.len(),
                "Partial delivery; affected connections will catch up from history"
            );
        }
        report
    }

    pub fn is_member(&self, conn_id: &ConnectionId, channel_id: &ChannelId) -> bool {
        self.rooms
            .get(channel_id)
            .map(|room| room.members.contains_key(conn_id))
            .unwrap_or(false)
    }

    pub fn members(&self, channel_id: &ChannelId) -> Vec<ConnectionId> {
        self.rooms
            .get(channel_id)
            .map(|room| room.members.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn channels_of(&self, conn_id: &ConnectionId) -> Vec<ChannelId> {
        self.memberships
            .get(conn_id)
            .map(|channels| channels.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.memberships.len()
    }
}
