//! Router configuration for the Parley API.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{create_chat, get_history, list_chats, AppState};
use super::middleware::{create_cors_layer, jwt_auth, AuthState};
use super::ws::chat_ws_handler;

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    auth_state: Arc<AuthState>,
    cors_origins: &[String],
) -> Router {
    let chat_routes = Router::new()
        .route("/chats", post(create_chat).get(list_chats))
        .route("/chats/:chat_id/messages", get(get_history))
        .route("/chat/ws", get(chat_ws_handler));

    let api_routes = Router::new().merge(chat_routes);

    // Clone auth_state for the middleware closure
    let auth_state_for_middleware = auth_state.clone();

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(move |req, next| {
                    let state = auth_state_for_middleware.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_health_router() {
        let _router = create_health_router();
        // Should not panic
    }
}
