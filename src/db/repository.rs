//! Repositories for Parley.
//!
//! This module provides CRUD operations over the chat store: users, chats,
//! participant rows and messages.

use chrono::Utc;
use uuid::Uuid;

use super::model::{Chat, MessageRow, MessageWithSender, NewUser, ParticipantRow, User, UserSummary};
use super::DbPool;
use crate::{ChatError, Result};

/// Joined select used wherever a message is returned with its sender summary.
const MESSAGE_SELECT: &str = "SELECT m.id, m.chat_id, m.sender_id, m.text, m.attachment_url, \
     m.created_at, u.name AS sender_name, u.surname AS sender_surname, \
     u.avatar_path AS sender_avatar_path \
     FROM messages m JOIN users u ON u.id = m.sender_id";

/// Repository for user rows.
pub struct UserRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new user in the database.
    ///
    /// Returns the created user with its assigned ID.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO users (id, name, surname, avatar_path) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&new_user.name)
            .bind(&new_user.surname)
            .bind(&new_user.avatar_path)
            .execute(self.pool)
            .await?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| ChatError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(
            "SELECT id, name, surname, avatar_path FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(result)
    }
}

/// Repository for chats, participant rows and messages.
pub struct ChatRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ChatRepository<'a> {
    /// Create a new ChatRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Get a chat by ID.
    pub async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>> {
        let result = sqlx::query_as::<_, Chat>("SELECT id, created_at FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(result)
    }

    /// List all chats the given user participates in, oldest first.
    pub async fn chats_of_user(&self, user_id: &str) -> Result<Vec<Chat>> {
        let chats = sqlx::query_as::<_, Chat>(
            "SELECT c.id, c.created_at FROM chats c \
             JOIN chat_participants p ON p.chat_id = c.id \
             WHERE p.user_id = ? \
             ORDER BY c.created_at ASC, c.rowid ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(chats)
    }

    /// List the participant user IDs of a chat.
    pub async fn participant_ids(&self, chat_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM chat_participants WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_all(self.pool)
        .await?;

        Ok(ids)
    }

    /// List the participants of every chat the given user is in, keyed by
    /// chat id. One query regardless of how many chats the user has.
    pub async fn participants_by_chat(
        &self,
        user_id: &str,
    ) -> Result<Vec<(String, UserSummary)>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT p.chat_id, u.id, u.name, u.surname, u.avatar_path \
             FROM chat_participants p \
             JOIN users u ON u.id = p.user_id \
             WHERE p.chat_id IN \
               (SELECT chat_id FROM chat_participants WHERE user_id = ?)",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.chat_id.clone(), UserSummary::from(row)))
            .collect())
    }

    /// Get the most recent message of every chat the given user is in.
    ///
    /// At most one message per chat; chats with no messages contribute no
    /// row. One query regardless of how many chats the user has.
    pub async fn latest_messages_by_chat(&self, user_id: &str) -> Result<Vec<MessageWithSender>> {
        let sql = format!(
            "{MESSAGE_SELECT} \
             WHERE m.chat_id IN \
               (SELECT chat_id FROM chat_participants WHERE user_id = ?) \
             AND m.rowid = \
               (SELECT m2.rowid FROM messages m2 WHERE m2.chat_id = m.chat_id \
                ORDER BY m2.created_at DESC, m2.rowid DESC LIMIT 1)"
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(MessageWithSender::from).collect())
    }

    /// Check whether a user is a participant of a chat.
    pub async fn is_participant(&self, chat_id: &str, user_id: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM chat_participants WHERE chat_id = ? AND user_id = ?)",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Create a chat and its participant rows in one transaction.
    ///
    /// Participant insertion uses skip-duplicates semantics, so a repeated
    /// user id never fails the write.
    pub async fn create_chat(&self, participant_ids: &[&str]) -> Result<Chat> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO chats (id, created_at) VALUES (?, ?)")
            .bind(&id)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

        for user_id in participant_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO chat_participants (chat_id, user_id) VALUES (?, ?)",
            )
            .bind(&id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_chat(&id)
            .await?
            .ok_or_else(|| ChatError::NotFound("chat".to_string()))
    }

    /// Persist a new message.
    ///
    /// Returns the message joined with its sender summary.
    pub async fn create_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        text: Option<&str>,
        attachment_url: Option<&str>,
    ) -> Result<MessageWithSender> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        sqlx::query(
            "INSERT INTO messages (id, chat_id, sender_id, text, attachment_url, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(chat_id)
        .bind(sender_id)
        .bind(text)
        .bind(attachment_url)
        .bind(created_at)
        .execute(self.pool)
        .await?;

        self.get_message(&id)
            .await?
            .ok_or_else(|| ChatError::NotFound("message".to_string()))
    }

    /// Get a message by ID, joined with its sender summary.
    pub async fn get_message(&self, id: &str) -> Result<Option<MessageWithSender>> {
        let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?");
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(MessageWithSender::from))
    }

    /// List non-deleted messages of a chat, ascending by creation time.
    pub async fn list_messages(
        &self,
        chat_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageWithSender>> {
        let sql = format!(
            "{MESSAGE_SELECT} WHERE m.chat_id = ? AND m.deleted = 0 \
             ORDER BY m.created_at ASC, m.rowid ASC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(chat_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(MessageWithSender::from).collect())
    }

}
