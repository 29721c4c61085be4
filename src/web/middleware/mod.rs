//! Middleware for the Parley web surface.

pub mod auth;
pub mod cors;

pub use auth::{jwt_auth, AuthState, AuthUser};
pub use cors::create_cors_layer;
