//! Real-time chat core: connection registry, room broadcaster, per-connection
//! session protocol and domain logic.

mod broadcaster;
mod registry;
mod service;
mod session;

pub use broadcaster::{ConnectionId, EventSender, RoomBroadcaster, RoomEvent};
pub use registry::ConnectionRegistry;
pub use service::ChatService;
pub use session::{ChatSession, Command};
