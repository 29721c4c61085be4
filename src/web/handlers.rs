//! API handlers for the Parley REST surface.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::auth::{CookieTokenExtractor, JwtVerifier, TokenExtractor};
use crate::chat::{ChatService, ConnectionRegistry, RoomBroadcaster};
use crate::config::{AuthConfig, ChatConfig};
use crate::db::{Chat, ChatSummary, Database, MessageWithSender};
use crate::web::dto::{ApiResponse, CreateChatRequest, HistoryQuery};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// Shared application state.
pub struct AppState {
    /// Chat domain service.
    pub service: Arc<ChatService>,
    /// Live connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Token verifier for WebSocket handshakes.
    pub verifier: Arc<JwtVerifier>,
    /// Credential extraction strategy for WebSocket handshakes.
    pub extractor: Arc<dyn TokenExtractor>,
}

impl AppState {
    /// Create application state wired to the given store.
    pub fn new(db: Database, auth: &AuthConfig, chat: ChatConfig) -> Self {
        let broadcaster = Arc::new(RoomBroadcaster::new());
        let registry = Arc::new(ConnectionRegistry::new(broadcaster.clone()));
        let service = Arc::new(ChatService::new(db, broadcaster, chat));

        Self {
            service,
            registry,
            verifier: Arc::new(JwtVerifier::new(&auth.jwt_secret)),
            extractor: Arc::new(CookieTokenExtractor::new(&auth.token_cookie)),
        }
    }
}

/// POST /api/chats - Create a private chat between two users.
///
/// Idempotent: if the pair already shares a chat, that chat is returned.
pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    AuthUser(_principal): AuthUser,
    Json(request): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Chat>>), ApiError> {
    let [a, b] = request.participant_ids.as_slice() else {
        return Err(ApiError::bad_request(
            "participant_ids must contain exactly two user ids",
        ));
    };

    let chat = state.service.create_chat(a, b).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(chat))))
}

/// GET /api/chats - List the caller's chats, most recently active first.
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<ApiResponse<Vec<ChatSummary>>>, ApiError> {
    let chats = state.service.list_user_chats(&principal.id).await?;
    Ok(Json(ApiResponse::new(chats)))
}

/// GET /api/chats/:chat_id/messages - Page through a chat's history.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(chat_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<MessageWithSender>>>, ApiError> {
    let messages = state
        .service
        .get_message_history(
            &principal.id,
            &chat_id,
            query.limit,
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(ApiResponse::new(messages)))
}
