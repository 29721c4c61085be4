//! Parley - a real-time private chat service.
//!
//! Authenticated WebSocket connections join per-chat rooms, post persisted
//! messages and ephemeral typing signals, and a REST surface covers chat
//! creation, chat lists and message history.

pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod web;

pub use auth::{
    encode_token, CookieTokenExtractor, HandshakeMetadata, JwtClaims, JwtVerifier, Principal,
    TokenExtractor, TokenVerifier,
};
pub use chat::{ChatService, ChatSession, Command, ConnectionRegistry, RoomBroadcaster, RoomEvent};
pub use config::Config;
pub use db::{Chat, ChatRepository, ChatSummary, Database, MessageWithSender, NewUser, User,
    UserRepository, UserSummary};
pub use error::{ChatError, Result};
pub use web::{AppState, WebServer};
