//! Room broadcaster for Parley.
//!
//! Rooms are implicit and ephemeral, keyed by chat id: an entry is created
//! lazily on first join and removed as soon as its member set becomes empty.
//! Each member is a live connection holding an unbounded event channel; a
//! broadcast walks the member set and pushes the event into every channel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

use crate::db::MessageWithSender;

/// Process-unique identifier of a live connection.
pub type ConnectionId = u64;

/// An event delivered to every member of a room.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A persisted chat message.
    Message(MessageWithSender),
    /// An ephemeral typing signal. Never persisted.
    Typing {
        /// Chat the signal belongs to.
        chat_id: String,
        /// User emitting the signal.
        user_id: String,
        /// Whether the user started or stopped typing.
        is_typing: bool,
    },
}

/// Outbound event channel of a connection.
pub type EventSender = mpsc::UnboundedSender<RoomEvent>;

/// A single room: the member set, guarded by one mutex.
///
/// The mutex covers both membership mutation and broadcast iteration, so a
/// broadcast never observes a partially updated member set and broadcasts to
/// the same room are delivered to every member in one agreed order.
struct Room {
    members: Mutex<HashMap<ConnectionId, EventSender>>,
}

impl Room {
    fn new() -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
        }
    }
}

/// Maintains the set of connections subscribed to each room and delivers
/// events to all subscribers of a room.
///
/// Performs no authorization: callers must authorize membership and message
/// posting before calling in.
pub struct RoomBroadcaster {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl RoomBroadcaster {
    /// Create a new broadcaster with no rooms.
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection to a room, creating the room entry if absent.
    ///
    /// Re-joining replaces the stored sender and is not an error.
    pub async fn join(&self, connection_id: ConnectionId, room_id: &str, sender: EventSender) {
        // The member is inserted while the rooms map is still write-locked,
        // so a concurrent `leave` cannot observe the room empty and delete
        // it out from under the join. Lock order is rooms, then members,
        // same as `leave`.
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Room::new()))
            .clone();

        let mut members = room.members.lock().await;
        members.insert(connection_id, sender);
        drop(members);
        drop(rooms);

        debug!("connection {} joined room {}", connection_id, room_id);
    }

    /// Remove a connection from a room.
    ///
    /// If the member set becomes empty, the room entry is deleted. Returns
    /// true if the connection was a member.
    pub async fn leave(&self, connection_id: ConnectionId, room_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get(room_id) else {
            return false;
        };

        let mut members = room.members.lock().await;
        let removed = members.remove(&connection_id).is_some();
        let empty = members.is_empty();
        drop(members);

        if empty {
            rooms.remove(room_id);
            debug!("room {} is empty, removed", room_id);
        }

        removed
    }

    /// Deliver an event to every connection currently in the room.
    ///
    /// A no-op, not an error, if the room has no members. Delivery failure
    /// to an individual member (its transport just closed) is swallowed and
    /// does not abort delivery to the remaining members. Returns the number
    /// of members the event was handed to.
    pub async fn broadcast(&self, room_id: &str, event: RoomEvent) -> usize {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(room_id).cloned() else {
            return 0;
        };
        drop(rooms);

        let members = room.members.lock().await;
        let mut delivered = 0;
        for (connection_id, sender) in members.iter() {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(
                    "dropping event for closed connection {} in room {}",
                    connection_id, room_id
                );
            }
        }
        delivered
    }

    /// Check whether a connection is a member of a room.
    pub async fn is_member(&self, connection_id: ConnectionId, room_id: &str) -> bool {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(room_id).cloned() else {
            return false;
        };
        drop(rooms);

        let members = room.members.lock().await;
        members.contains_key(&connection_id)
    }

    /// Number of members currently in a room.
    pub async fn member_count(&self, room_id: &str) -> usize {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(room_id).cloned() else {
            return 0;
        };
        drop(rooms);

        let members = room.members.lock().await;
        members.len()
    }

    /// Number of rooms that currently have at least one member.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn channel() -> (EventSender, UnboundedReceiver<RoomEvent>) {
        mpsc::unbounded_channel()
    }

    fn typing(chat_id: &str, user_id: &str) -> RoomEvent {
        RoomEvent::Typing {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
            is_typing: true,
        }
    }

    #[tokio::test]
    async fn test_join_creates_room() {
        let broadcaster = RoomBroadcaster::new();
        let (tx, _rx) = channel();

        assert_eq!(broadcaster.room_count().await, 0);
        broadcaster.join(1, "chat-1", tx).await;
        assert_eq!(broadcaster.room_count().await, 1);
        assert_eq!(broadcaster.member_count("chat-1").await, 1);
        assert!(broadcaster.is_member(1, "chat-1").await);
    }

    #[tokio::test]
    async fn test_leave_removes_empty_room() {
        let broadcaster = RoomBroadcaster::new();
        let (tx, _rx) = channel();

        broadcaster.join(1, "chat-1", tx).await;
        assert!(broadcaster.leave(1, "chat-1").await);

        // Zero-member room is gone, not retained
        assert_eq!(broadcaster.room_count().await, 0);
        assert!(!broadcaster.is_member(1, "chat-1").await);
    }

    #[tokio::test]
    async fn test_leave_keeps_room_with_members() {
        let broadcaster = RoomBroadcaster::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        broadcaster.join(1, "chat-1", tx1).await;
        broadcaster.join(2, "chat-1", tx2).await;

        assert!(broadcaster.leave(1, "chat-1").await);
        assert_eq!(broadcaster.room_count().await, 1);
        assert_eq!(broadcaster.member_count("chat-1").await, 1);
    }

    #[tokio::test]
    async fn test_leave_not_a_member() {
        let broadcaster = RoomBroadcaster::new();
        let (tx, _rx) = channel();

        broadcaster.join(1, "chat-1", tx).await;
        assert!(!broadcaster.leave(2, "chat-1").await);
        assert!(!broadcaster.leave(1, "chat-other").await);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_members_including_sender() {
        let broadcaster = RoomBroadcaster::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();

        broadcaster.join(1, "chat-1", tx1).await;
        broadcaster.join(2, "chat-1", tx2).await;

        let delivered = broadcaster.broadcast("chat-1", typing("chat-1", "u1")).await;
        assert_eq!(delivered, 2);

        assert!(matches!(
            rx1.recv().await,
            Some(RoomEvent::Typing { .. })
        ));
        assert!(matches!(
            rx2.recv().await,
            Some(RoomEvent::Typing { .. })
        ));
    }

    #[tokio::test]
    async fn test_broadcast_empty_room_is_noop() {
        let broadcaster = RoomBroadcaster::new();
        let delivered = broadcaster.broadcast("chat-1", typing("chat-1", "u1")).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_broadcast_scoped_to_room() {
        let broadcaster = RoomBroadcaster::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();

        broadcaster.join(1, "chat-1", tx1).await;
        broadcaster.join(2, "chat-2", tx2).await;

        broadcaster.broadcast("chat-1", typing("chat-1", "u1")).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_swallows_closed_receiver() {
        let broadcaster = RoomBroadcaster::new();
        let (tx1, rx1) = channel();
        let (tx2, mut rx2) = channel();

        broadcaster.join(1, "chat-1", tx1).await;
        broadcaster.join(2, "chat-1", tx2).await;

        // Member 1's transport closed without leaving
        drop(rx1);

        let delivered = broadcaster.broadcast("chat-1", typing("chat-1", "u2")).await;
        assert_eq!(delivered, 1);
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_order_preserved_per_member() {
        let broadcaster = RoomBroadcaster::new();
        let (tx, mut rx) = channel();

        broadcaster.join(1, "chat-1", tx).await;

        broadcaster.broadcast("chat-1", typing("chat-1", "first")).await;
        broadcaster.broadcast("chat-1", typing("chat-1", "second")).await;

        match rx.recv().await.unwrap() {
            RoomEvent::Typing { user_id, .. } => assert_eq!(user_id, "first"),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            RoomEvent::Typing { user_id, .. } => assert_eq!(user_id, "second"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_join_racing_last_leave_keeps_member_reachable() {
        // A join landing while the room's last member leaves must end up in
        // the live room entry, not in a deleted one.
        let broadcaster = Arc::new(RoomBroadcaster::new());

        for round in 0..200u64 {
            let (tx_old, _rx_old) = channel();
            broadcaster.join(1, "chat-1", tx_old).await;

            let (tx_new, mut rx_new) = channel();
            let b1 = broadcaster.clone();
            let b2 = broadcaster.clone();
            let joiner = tokio::spawn(async move { b1.join(2, "chat-1", tx_new).await });
            let leaver = tokio::spawn(async move { b2.leave(1, "chat-1").await });
            joiner.await.unwrap();
            leaver.await.unwrap();

            assert!(
                broadcaster.is_member(2, "chat-1").await,
                "round {round}: joiner lost"
            );
            let delivered = broadcaster.broadcast("chat-1", typing("chat-1", "u1")).await;
            assert_eq!(delivered, 1, "round {round}");
            assert!(rx_new.try_recv().is_ok());

            broadcaster.leave(2, "chat-1").await;
        }
    }

    #[tokio::test]
    async fn test_concurrent_joins() {
        let broadcaster = Arc::new(RoomBroadcaster::new());

        let mut handles = Vec::new();
        for i in 0..10u64 {
            let b = broadcaster.clone();
            handles.push(tokio::spawn(async move {
                let (tx, rx) = channel();
                b.join(i, "chat-1", tx).await;
                rx
            }));
        }
        let mut receivers = Vec::new();
        for h in handles {
            receivers.push(h.await.unwrap());
        }

        assert_eq!(broadcaster.member_count("chat-1").await, 10);
        let delivered = broadcaster.broadcast("chat-1", typing("chat-1", "u1")).await;
        assert_eq!(delivered, 10);
    }
}
