//! Per-connection command protocol.
//!
//! A session is created once the handshake succeeded and the connection is
//! registered. It dispatches the connection's commands against the registry
//! and the domain service; every error it returns is delivered to the
//! originating connection only, never broadcast, and never closes the
//! connection.

use std::sync::Arc;

use tracing::debug;

use super::broadcaster::ConnectionId;
use super::registry::ConnectionRegistry;
use super::service::ChatService;
use crate::Result;

/// A command issued by an authenticated connection.
#[derive(Debug, Clone)]
pub enum Command {
    /// Join a room. Deliberately permissive: any authenticated connection
    /// may join any room; participation is checked per message and per
    /// history read, not per join.
    Join {
        /// Chat (room) id.
        chat_id: String,
    },
    /// Leave a room. Tolerated if the room was never joined.
    Leave {
        /// Chat (room) id.
        chat_id: String,
    },
    /// Post a message to a chat.
    Message {
        /// Chat id.
        chat_id: String,
        /// Message text.
        text: Option<String>,
        /// Attachment URL.
        attachment_url: Option<String>,
    },
    /// Emit a typing signal.
    Typing {
        /// Chat id.
        chat_id: String,
        /// Whether the user started or stopped typing.
        is_typing: bool,
    },
}

/// Command dispatcher for one live connection.
pub struct ChatSession {
    connection_id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    service: Arc<ChatService>,
}

impl ChatSession {
    /// Create a session for an already-registered connection.
    pub fn new(
        connection_id: ConnectionId,
        registry: Arc<ConnectionRegistry>,
        service: Arc<ChatService>,
    ) -> Self {
        Self {
            connection_id,
            registry,
            service,
        }
    }

    /// The connection this session belongs to.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Handle one command.
    ///
    /// Errors are scoped to this connection: the caller reports them back on
    /// the session's own transport and keeps the connection open.
    pub async fn handle(&self, command: Command) -> Result<()> {
        match command {
            Command::Join { chat_id } => {
                self.registry.join_room(self.connection_id, &chat_id).await
            }
            Command::Leave { chat_id } => {
                self.registry.leave_room(self.connection_id, &chat_id).await
            }
            Command::Message {
                chat_id,
                text,
                attachment_url,
            } => {
                let principal = self.registry.identity_of(self.connection_id).await?;
                self.service
                    .post_message(
                        &principal.id,
                        &chat_id,
                        text.as_deref(),
                        attachment_url.as_deref(),
                    )
                    .await?;
                Ok(())
            }
            Command::Typing { chat_id, is_typing } => {
                let principal = self.registry.identity_of(self.connection_id).await?;
                self.service
                    .broadcast_typing(&chat_id, &principal.id, is_typing)
                    .await;
                Ok(())
            }
        }
    }

    /// Tear the session down: removes the connection from every room and
    /// deletes its record. Safe to call more than once.
    pub async fn close(&self) {
        debug!("closing session for connection {}", self.connection_id);
        self.registry.disconnect(self.connection_id).await;
    }
}
