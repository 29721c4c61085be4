//! Web API module for Parley.
//!
//! Exposes the chat subsystem over REST (chat creation, chat list, message
//! history) and a WebSocket endpoint for real-time messaging.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod ws;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
