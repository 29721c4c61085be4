//! Database schema and migrations for Parley.
//!
//! This module contains all database migrations that will be applied
//! sequentially when the database is first opened or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Initial schema - users, chats, participants, messages
    r#"
-- Users table. Credential issuance lives outside this system; rows here
-- back the sender summaries attached to messages.
CREATE TABLE users (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    surname     TEXT,
    avatar_path TEXT,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Chats table. A chat is a conversation between two or more users.
CREATE TABLE chats (
    id          TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL
);

-- Participant rows, one per (chat, user) membership.
CREATE TABLE chat_participants (
    chat_id     TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    joined_at   TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (chat_id, user_id)
);

CREATE INDEX idx_chat_participants_user ON chat_participants(user_id);

-- Messages table. Messages are never mutated by the server; deleted is a
-- soft flag honored by history reads.
CREATE TABLE messages (
    id              TEXT PRIMARY KEY,
    chat_id         TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    sender_id       TEXT NOT NULL REFERENCES users(id),
    text            TEXT,
    attachment_url  TEXT,
    created_at      TEXT NOT NULL,
    deleted         INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_messages_chat_created ON messages(chat_id, created_at);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_migrations_contain_core_tables() {
        let all = MIGRATIONS.join("\n");
        assert!(all.contains("CREATE TABLE users"));
        assert!(all.contains("CREATE TABLE chats"));
        assert!(all.contains("CREATE TABLE chat_participants"));
        assert!(all.contains("CREATE TABLE messages"));
    }
}
