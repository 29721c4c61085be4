//! Row types for the Parley database.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A user row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct User {
    /// User ID.
    pub id: String,
    /// Given name.
    pub name: String,
    /// Family name.
    pub surname: Option<String>,
    /// Avatar path.
    pub avatar_path: Option<String>,
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Given name.
    pub name: String,
    /// Family name.
    pub surname: Option<String>,
    /// Avatar path.
    pub avatar_path: Option<String>,
}

/// The public sender summary attached to broadcast and history messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    /// User ID.
    pub id: String,
    /// Given name.
    pub name: String,
    /// Family name.
    pub surname: Option<String>,
    /// Avatar path.
    pub avatar_path: Option<String>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            surname: user.surname,
            avatar_path: user.avatar_path,
        }
    }
}

/// A chat row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Chat {
    /// Chat ID. Doubles as the room id on the WebSocket side.
    pub id: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A persisted message joined with its sender summary.
///
/// This is the shape sent in `message` broadcast events and history reads.
#[derive(Debug, Clone, Serialize)]
pub struct MessageWithSender {
    /// Message ID.
    pub id: String,
    /// Chat this message belongs to.
    pub chat_id: String,
    /// Sender's user ID.
    pub sender_id: String,
    /// Message text.
    pub text: Option<String>,
    /// Attachment URL.
    pub attachment_url: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Sender summary.
    pub sender: UserSummary,
}

/// Flat joined row used to build [`MessageWithSender`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub text: Option<String>,
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sender_name: String,
    pub sender_surname: Option<String>,
    pub sender_avatar_path: Option<String>,
}

impl From<MessageRow> for MessageWithSender {
    fn from(row: MessageRow) -> Self {
        Self {
            sender: UserSummary {
                id: row.sender_id.clone(),
                name: row.sender_name,
                surname: row.sender_surname,
                avatar_path: row.sender_avatar_path,
            },
            id: row.id,
            chat_id: row.chat_id,
            sender_id: row.sender_id,
            text: row.text,
            attachment_url: row.attachment_url,
            created_at: row.created_at,
        }
    }
}

/// Flat joined row pairing a chat id with one participant's summary.
///
/// Used by the batched chat-list read, which fetches the participants of
/// all of a user's chats in one query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ParticipantRow {
    pub chat_id: String,
    pub id: String,
    pub name: String,
    pub surname: Option<String>,
    pub avatar_path: Option<String>,
}

impl From<ParticipantRow> for UserSummary {
    fn from(row: ParticipantRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            surname: row.surname,
            avatar_path: row.avatar_path,
        }
    }
}

/// A chat annotated for the chat-list view: participants and latest message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSummary {
    /// Chat ID.
    pub id: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Participants with user summaries.
    pub participants: Vec<UserSummary>,
    /// Most recent message, if any.
    pub last_message: Option<MessageWithSender>,
}

impl ChatSummary {
    /// Timestamp used for sorting the chat list.
    ///
    /// Chats with no messages sort as oldest, using the epoch floor.
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.last_message
            .as_ref()
            .map(|m| m.created_at)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}
