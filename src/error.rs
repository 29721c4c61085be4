//! Error types for Parley.

use thiserror::Error;

/// Common error type for Parley.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Missing or invalid credential at connection handshake.
    ///
    /// Terminal for the connection: the transport is closed immediately.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// An authenticated principal attempted an action outside their
    /// authorization (posting to or reading a chat they don't belong to).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed command payload (self-chat, empty message, bad paging).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Referenced chat/user/message does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Persistence layer failure.
    ///
    /// Wraps errors from the database backend; sqlx errors convert
    /// automatically. Persistence precedes broadcast, so a database error
    /// guarantees no broadcast happened.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for ChatError {
    fn from(e: sqlx::Error) -> Self {
        ChatError::Database(e.to_string())
    }
}

/// Result type alias for Parley operations.
pub type Result<T> = std::result::Result<T, ChatError>;
