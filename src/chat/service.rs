//! Chat domain logic for Parley.
//!
//! Enforces the chat-creation dedup rule and membership authorization, and
//! orchestrates persistence-then-broadcast ordering for messages.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::broadcaster::{RoomBroadcaster, RoomEvent};
use crate::config::ChatConfig;
use crate::db::{Chat, ChatRepository, ChatSummary, Database, MessageWithSender, UserSummary};
use crate::{ChatError, Result};

/// Chat domain service.
///
/// Shared across all connections and the REST surface.
pub struct ChatService {
    db: Database,
    broadcaster: Arc<RoomBroadcaster>,
    config: ChatConfig,
}

impl ChatService {
    /// Create a new service.
    pub fn new(db: Database, broadcaster: Arc<RoomBroadcaster>, config: ChatConfig) -> Self {
        Self {
            db,
            broadcaster,
            config,
        }
    }

    /// The broadcaster this service fans out through.
    pub fn broadcaster(&self) -> &Arc<RoomBroadcaster> {
        &self.broadcaster
    }

    /// Create a private chat between two users, or return the existing one.
    ///
    /// Idempotent: repeated calls with the same pair (in either argument
    /// order) never create duplicates. The dedup scans the first
    /// participant's chats for one that already contains the second; a
    /// concurrent-create race can therefore still slip through and is left
    /// to a store-level uniqueness constraint as future hardening.
    pub async fn create_chat(&self, participant_a: &str, participant_b: &str) -> Result<Chat> {
        if participant_a == participant_b {
            return Err(ChatError::InvalidRequest(
                "cannot create a chat with yourself".to_string(),
            ));
        }

        let repo = ChatRepository::new(self.db.pool());

        for chat in repo.chats_of_user(participant_a).await? {
            let ids = repo.participant_ids(&chat.id).await?;
            if ids.iter().any(|id| id == participant_b) {
                debug!("chat between {} and {} already exists", participant_a, participant_b);
                return Ok(chat);
            }
        }

        let chat = repo.create_chat(&[participant_a, participant_b]).await?;
        debug!("created chat {} for {} and {}", chat.id, participant_a, participant_b);
        Ok(chat)
    }

    /// List the chats a user participates in, each annotated with its most
    /// recent message, most recently active first.
    ///
    /// Chats with no messages sort as oldest (epoch floor), not excluded.
    /// Three queries total, independent of how many chats the user has.
    pub async fn list_user_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>> {
        let repo = ChatRepository::new(self.db.pool());

        let chats = repo.chats_of_user(user_id).await?;

        let mut participants: HashMap<String, Vec<UserSummary>> = HashMap::new();
        for (chat_id, summary) in repo.participants_by_chat(user_id).await? {
            participants.entry(chat_id).or_default().push(summary);
        }

        let mut latest: HashMap<String, MessageWithSender> = repo
            .latest_messages_by_chat(user_id)
            .await?
            .into_iter()
            .map(|message| (message.chat_id.clone(), message))
            .collect();

        let mut summaries: Vec<ChatSummary> = chats
            .into_iter()
            .map(|chat| ChatSummary {
                participants: participants.remove(&chat.id).unwrap_or_default(),
                last_message: latest.remove(&chat.id),
                id: chat.id,
                created_at: chat.created_at,
            })
            .collect();

        summaries.sort_by(|a, b| b.activity_at().cmp(&a.activity_at()));
        Ok(summaries)
    }

    /// Fetch a page of a chat's message history.
    ///
    /// Fails with `Forbidden` unless the user is a participant; the
    /// membership check precedes any data return. Returns non-deleted
    /// messages ascending by creation time.
    pub async fn get_message_history(
        &self,
        user_id: &str,
        chat_id: &str,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<MessageWithSender>> {
        let repo = ChatRepository::new(self.db.pool());

        if !repo.is_participant(chat_id, user_id).await? {
            return Err(ChatError::Forbidden(
                "no access to this chat's messages".to_string(),
            ));
        }

        let limit = limit
            .unwrap_or(self.config.history_default_limit)
            .min(self.config.history_max_limit);

        repo.list_messages(chat_id, limit, offset).await
    }

    /// Persist a message and broadcast it to the chat's room.
    ///
    /// Fails with `Forbidden` unless the sender is a participant and with
    /// `InvalidRequest` if both text and attachment are absent. Persistence
    /// strictly precedes broadcast, so a client refreshing history after
    /// receiving the event always finds the message; a store failure
    /// guarantees no broadcast happened.
    pub async fn post_message(
        &self,
        sender_id: &str,
        chat_id: &str,
        text: Option<&str>,
        attachment_url: Option<&str>,
    ) -> Result<MessageWithSender> {
        let repo = ChatRepository::new(self.db.pool());

        if !repo.is_participant(chat_id, sender_id).await? {
            return Err(ChatError::Forbidden(
                "you are not a participant of this chat".to_string(),
            ));
        }

        if text.map_or(true, str::is_empty) && attachment_url.map_or(true, str::is_empty) {
            return Err(ChatError::InvalidRequest(
                "message needs text or an attachment".to_string(),
            ));
        }

        let message = repo
            .create_message(chat_id, sender_id, text, attachment_url)
            .await?;

        self.broadcaster
            .broadcast(chat_id, RoomEvent::Message(message.clone()))
            .await;

        Ok(message)
    }

    /// Broadcast a typing signal to the chat's room.
    ///
    /// No persistence and no authorization check: any authenticated
    /// connection may emit typing signals.
    pub async fn broadcast_typing(&self, chat_id: &str, user_id: &str, is_typing: bool) {
        self.broadcaster
            .broadcast(
                chat_id,
                RoomEvent::Typing {
                    chat_id: chat_id.to_string(),
                    user_id: user_id.to_string(),
                    is_typing,
                },
            )
            .await;
    }
}
