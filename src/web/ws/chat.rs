//! Chat WebSocket handler.
//!
//! Authenticates the handshake before upgrading, then bridges the socket to
//! the connection registry: inbound frames become session commands, room
//! events fan back out as outbound frames.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        RawQuery, State, WebSocketUpgrade,
    },
    http::{header::COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::auth::{HandshakeMetadata, Principal, TokenExtractor, TokenVerifier};
use crate::chat::{ChatSession, Command};
use crate::Result;

use super::super::handlers::AppState;
use super::messages::{ClientMessage, ServerMessage};

/// WebSocket chat handler.
///
/// GET /api/chat/ws
///
/// The credential is read from the access token cookie, falling back to a
/// `token` query parameter. An unverifiable handshake is rejected with 401
/// before the upgrade happens. Registration with the connection registry is
/// deferred into the socket task: an upgrade that never completes leaves no
/// connection record behind.
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let meta = HandshakeMetadata {
        cookie_header: headers
            .get(COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(|s| s.to_string()),
        query,
    };

    let principal = match authenticate(&state, &meta) {
        Ok(principal) => principal,
        Err(e) => {
            tracing::debug!("WebSocket connection rejected: {}", e);
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, principal))
}

/// Verify the handshake credential without touching the registry.
fn authenticate(state: &AppState, meta: &HandshakeMetadata) -> Result<Principal> {
    let token = state
        .extractor
        .extract_token(meta)
        .ok_or_else(|| crate::ChatError::Unauthenticated("missing credential".to_string()))?;
    state.verifier.verify(&token)
}

/// Handle an upgraded WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, principal: Principal) {
    let (tx, mut events) = tokio::sync::mpsc::unbounded_channel();
    let connection_id = state.registry.register(principal, tx).await;
    tracing::debug!("WebSocket session started: connection {}", connection_id);

    let session = ChatSession::new(connection_id, state.registry.clone(), state.service.clone());
    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            // Inbound frames from the client
            Some(msg_result) = ws_receiver.next() => {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Ping) => {
                                if send(&mut ws_sender, &ServerMessage::Pong).await.is_err() {
                                    break;
                                }
                            }
                            Ok(client_msg) => {
                                let command: Option<Command> = client_msg.into();
                                let Some(command) = command else { continue };
                                if let Err(e) = session.handle(command).await {
                                    tracing::debug!(
                                        "command failed on connection {}: {}",
                                        connection_id,
                                        e
                                    );
                                    // Errors stay on this socket; the connection
                                    // survives
                                    let _ = send(&mut ws_sender, &ServerMessage::from_error(&e)).await;
                                }
                            }
                            Err(e) => {
                                tracing::debug!("failed to parse client message: {}", e);
                                let error = ServerMessage::error(
                                    "invalid_message",
                                    "Invalid message format",
                                );
                                let _ = send(&mut ws_sender, &error).await;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::debug!("WebSocket closed by client: connection {}", connection_id);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                }
            }

            // Room events fanned out to this connection
            event = events.recv() => {
                match event {
                    Some(event) => {
                        if send(&mut ws_sender, &ServerMessage::from(event)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    session.close().await;
    tracing::debug!("WebSocket session ended: connection {}", connection_id);
}

async fn send(
    ws_sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> std::result::Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => ws_sender.send(Message::Text(json)).await,
        Err(e) => {
            tracing::error!("failed to serialize server message: {}", e);
            Ok(())
        }
    }
}
