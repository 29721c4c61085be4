//! Connection registry for Parley.
//!
//! Tracks each live connection's authenticated identity and room
//! memberships. A connection record is created on transport accept (after a
//! successful handshake) and destroyed on disconnect, which also removes the
//! connection from every room it joined.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::broadcaster::{ConnectionId, EventSender, RoomBroadcaster};
use crate::auth::{HandshakeMetadata, Principal, TokenExtractor, TokenVerifier};
use crate::{ChatError, Result};

/// State kept per live connection.
struct ConnectionEntry {
    principal: Principal,
    joined_rooms: HashSet<String>,
    sender: EventSender,
}

/// Registry of live, authenticated connections.
pub struct ConnectionRegistry {
    broadcaster: Arc<RoomBroadcaster>,
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Create a registry fanning out through the given broadcaster.
    pub fn new(broadcaster: Arc<RoomBroadcaster>) -> Self {
        Self {
            broadcaster,
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Run the handshake for a new connection.
    ///
    /// Extracts a credential from the handshake metadata and verifies it.
    /// On success the connection is registered under a fresh id, bound to
    /// the resolved principal and to its outbound event channel. On failure
    /// the caller must close the transport immediately; there is no retry at
    /// this layer.
    pub async fn connect(
        &self,
        meta: &HandshakeMetadata,
        extractor: &dyn TokenExtractor,
        verifier: &dyn TokenVerifier,
        sender: EventSender,
    ) -> Result<ConnectionId> {
        let token = extractor
            .extract_token(meta)
            .ok_or_else(|| ChatError::Unauthenticated("missing credential".to_string()))?;

        let principal = verifier.verify(&token)?;
        Ok(self.register(principal, sender).await)
    }

    /// Register an already-verified principal under a fresh connection id.
    ///
    /// Callers that verify the credential before the transport exists (the
    /// WebSocket upgrade path) use this to defer registration until the
    /// socket task is actually running, so nothing is registered for an
    /// upgrade that never completes.
    pub async fn register(&self, principal: Principal, sender: EventSender) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!("connection {} authenticated as user {}", id, principal.id);

        self.connections.write().await.insert(
            id,
            ConnectionEntry {
                principal,
                joined_rooms: HashSet::new(),
                sender,
            },
        );

        id
    }

    /// Remove the connection from every room it joined and delete its
    /// record. Idempotent: disconnecting an unknown connection is a no-op.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let entry = self.connections.write().await.remove(&connection_id);
        let Some(entry) = entry else {
            return;
        };

        for room_id in &entry.joined_rooms {
            self.broadcaster.leave(connection_id, room_id).await;
        }
        debug!(
            "connection {} disconnected, left {} room(s)",
            connection_id,
            entry.joined_rooms.len()
        );
    }

    /// Look up the principal bound to a connection.
    pub async fn identity_of(&self, connection_id: ConnectionId) -> Result<Principal> {
        self.connections
            .read()
            .await
            .get(&connection_id)
            .map(|entry| entry.principal.clone())
            .ok_or_else(|| ChatError::Unauthenticated("connection is not authenticated".to_string()))
    }

    /// Add the connection to a room.
    ///
    /// No authorization beyond being a registered (authenticated)
    /// connection; message-level authorization happens per message.
    pub async fn join_room(&self, connection_id: ConnectionId, room_id: &str) -> Result<()> {
        let sender = {
            let mut connections = self.connections.write().await;
            let entry = connections.get_mut(&connection_id).ok_or_else(|| {
                ChatError::Unauthenticated("connection is not authenticated".to_string())
            })?;
            entry.joined_rooms.insert(room_id.to_string());
            entry.sender.clone()
        };

        self.broadcaster.join(connection_id, room_id, sender).await;

        // A disconnect may have swept the connection's rooms between the two
        // locks above. If the record is gone, undo the join so the room
        // never retains a dead member.
        if !self.connections.read().await.contains_key(&connection_id) {
            self.broadcaster.leave(connection_id, room_id).await;
            return Err(ChatError::Unauthenticated(
                "connection is not authenticated".to_string(),
            ));
        }
        Ok(())
    }

    /// Remove the connection from a room. Tolerated if it never joined.
    pub async fn leave_room(&self, connection_id: ConnectionId, room_id: &str) -> Result<()> {
        {
            let mut connections = self.connections.write().await;
            let entry = connections.get_mut(&connection_id).ok_or_else(|| {
                ChatError::Unauthenticated("connection is not authenticated".to_string())
            })?;
            entry.joined_rooms.remove(room_id);
        }

        self.broadcaster.leave(connection_id, room_id).await;
        Ok(())
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
