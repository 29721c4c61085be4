//! WebSocket message types for chat communication.

use serde::{Deserialize, Serialize};

use crate::chat::{Command, RoomEvent};
use crate::db::MessageWithSender;
use crate::ChatError;

/// Messages sent from client to server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a chat room.
    Join {
        /// Chat ID to join.
        chat_id: String,
    },
    /// Leave a chat room.
    Leave {
        /// Chat ID to leave.
        chat_id: String,
    },
    /// Post a message to a chat.
    Message {
        /// Chat ID.
        chat_id: String,
        /// Message text.
        #[serde(default)]
        text: Option<String>,
        /// Attachment URL.
        #[serde(default)]
        attachment_url: Option<String>,
    },
    /// Typing indicator.
    Typing {
        /// Chat ID.
        chat_id: String,
        /// Whether the user started or stopped typing.
        is_typing: bool,
    },
    /// Heartbeat ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A persisted chat message.
    Message {
        /// The message, with sender details.
        message: MessageWithSender,
    },
    /// Typing indicator from another participant.
    Typing {
        /// Chat ID.
        chat_id: String,
        /// User who is (or stopped) typing.
        user_id: String,
        /// Whether the user started or stopped typing.
        is_typing: bool,
    },
    /// Error message.
    Error {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
    },
    /// Heartbeat pong response.
    Pong,
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Error message for a failed command, with internal details masked.
    pub fn from_error(err: &ChatError) -> Self {
        match err {
            ChatError::Unauthenticated(msg) => Self::error("unauthenticated", msg.clone()),
            ChatError::Forbidden(msg) => Self::error("forbidden", msg.clone()),
            ChatError::InvalidRequest(msg) => Self::error("invalid_request", msg.clone()),
            ChatError::NotFound(what) => Self::error("not_found", format!("{what} not found")),
            _ => Self::error("internal_error", "Internal server error"),
        }
    }
}

impl From<RoomEvent> for ServerMessage {
    fn from(event: RoomEvent) -> Self {
        match event {
            RoomEvent::Message(message) => ServerMessage::Message { message },
            RoomEvent::Typing {
                chat_id,
                user_id,
                is_typing,
            } => ServerMessage::Typing {
                chat_id,
                user_id,
                is_typing,
            },
        }
    }
}

impl From<ClientMessage> for Option<Command> {
    fn from(msg: ClientMessage) -> Self {
        match msg {
            ClientMessage::Join { chat_id } => Some(Command::Join { chat_id }),
            ClientMessage::Leave { chat_id } => Some(Command::Leave { chat_id }),
            ClientMessage::Message {
                chat_id,
                text,
                attachment_url,
            } => Some(Command::Message {
                chat_id,
                text,
                attachment_url,
            }),
            ClientMessage::Typing { chat_id, is_typing } => {
                Some(Command::Typing { chat_id, is_typing })
            }
            ClientMessage::Ping => None,
        }
    }
}
