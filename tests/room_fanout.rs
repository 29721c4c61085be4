//! Room Fan-out Tests
//!
//! Integration tests for multi-connection broadcast behavior across the
//! registry, service and session layers.

use std::sync::Arc;

use parley::auth::{encode_token, CookieTokenExtractor, HandshakeMetadata, JwtClaims, JwtVerifier};
use parley::chat::{ChatService, ChatSession, Command, ConnectionRegistry, RoomBroadcaster, RoomEvent};
use parley::config::ChatConfig;
use parley::db::{Database, NewUser, User, UserRepository};
use tokio::sync::mpsc::UnboundedReceiver;

const JWT_SECRET: &str = "fanout-test-secret";

struct Harness {
    db: Database,
    registry: Arc<ConnectionRegistry>,
    service: Arc<ChatService>,
    verifier: JwtVerifier,
    extractor: CookieTokenExtractor,
}

async fn harness() -> Harness {
    let db = Database::open_in_memory().await.unwrap();
    let broadcaster = Arc::new(RoomBroadcaster::new());
    let registry = Arc::new(ConnectionRegistry::new(broadcaster.clone()));
    let service = Arc::new(ChatService::new(
        db.clone(),
        broadcaster,
        ChatConfig::default(),
    ));
    Harness {
        db,
        registry,
        service,
        verifier: JwtVerifier::new(JWT_SECRET),
        extractor: CookieTokenExtractor::default(),
    }
}

impl Harness {
    async fn seed_user(&self, name: &str) -> User {
        UserRepository::new(self.db.pool())
            .create(&NewUser {
                name: name.to_string(),
                surname: None,
                avatar_path: None,
            })
            .await
            .unwrap()
    }

    /// Open a session with a real JWT carried in the handshake cookie.
    async fn connect(&self, user_id: &str) -> (ChatSession, UnboundedReceiver<RoomEvent>) {
        let token = encode_token(JWT_SECRET, &JwtClaims::new(user_id, None, 3600)).unwrap();
        let meta = HandshakeMetadata {
            cookie_header: Some(format!("accessToken={token}")),
            query: None,
        };
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let id = self
            .registry
            .connect(&meta, &self.extractor, &self.verifier, tx)
            .await
            .unwrap();
        (
            ChatSession::new(id, self.registry.clone(), self.service.clone()),
            rx,
        )
    }
}

fn message_text(event: RoomEvent) -> String {
    match event {
        RoomEvent::Message(msg) => msg.text.unwrap_or_default(),
        other => panic!("expected message event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_all_room_members_receive_broadcast() {
    let h = harness().await;
    let alice = h.seed_user("Alice").await;
    let bob = h.seed_user("Bob").await;
    let chat = h.service.create_chat(&alice.id, &bob.id).await.unwrap();

    // Bob opens the chat from several devices at once
    let mut receivers = Vec::new();
    for _ in 0..10 {
        let (session, rx) = h.connect(&bob.id).await;
        session
            .handle(Command::Join {
                chat_id: chat.id.clone(),
            })
            .await
            .unwrap();
        receivers.push(rx);
    }

    let (alice_session, _alice_rx) = h.connect(&alice.id).await;
    alice_session
        .handle(Command::Message {
            chat_id: chat.id.clone(),
            text: Some("to everyone".to_string()),
            attachment_url: None,
        })
        .await
        .unwrap();

    for rx in &mut receivers {
        assert_eq!(message_text(rx.recv().await.unwrap()), "to everyone");
    }
}

#[tokio::test]
async fn test_broadcast_order_matches_post_order() {
    let h = harness().await;
    let alice = h.seed_user("Alice").await;
    let bob = h.seed_user("Bob").await;
    let chat = h.service.create_chat(&alice.id, &bob.id).await.unwrap();

    let (alice_session, _alice_rx) = h.connect(&alice.id).await;
    let (bob_session, mut bob_rx) = h.connect(&bob.id).await;
    bob_session
        .handle(Command::Join {
            chat_id: chat.id.clone(),
        })
        .await
        .unwrap();

    for i in 0..20 {
        alice_session
            .handle(Command::Message {
                chat_id: chat.id.clone(),
                text: Some(format!("msg {i}")),
                attachment_url: None,
            })
            .await
            .unwrap();
    }

    for i in 0..20 {
        assert_eq!(message_text(bob_rx.recv().await.unwrap()), format!("msg {i}"));
    }
}

#[tokio::test]
async fn test_connection_in_two_rooms_receives_both() {
    let h = harness().await;
    let alice = h.seed_user("Alice").await;
    let bob = h.seed_user("Bob").await;
    let carol = h.seed_user("Carol").await;
    let chat_ab = h.service.create_chat(&alice.id, &bob.id).await.unwrap();
    let chat_ac = h.service.create_chat(&alice.id, &carol.id).await.unwrap();

    let (alice_session, mut alice_rx) = h.connect(&alice.id).await;
    for chat_id in [&chat_ab.id, &chat_ac.id] {
        alice_session
            .handle(Command::Join {
                chat_id: chat_id.clone(),
            })
            .await
            .unwrap();
    }

    let (bob_session, _bob_rx) = h.connect(&bob.id).await;
    let (carol_session, _carol_rx) = h.connect(&carol.id).await;

    bob_session
        .handle(Command::Message {
            chat_id: chat_ab.id.clone(),
            text: Some("from bob".to_string()),
            attachment_url: None,
        })
        .await
        .unwrap();
    carol_session
        .handle(Command::Message {
            chat_id: chat_ac.id.clone(),
            text: Some("from carol".to_string()),
            attachment_url: None,
        })
        .await
        .unwrap();

    let first = alice_rx.recv().await.unwrap();
    let second = alice_rx.recv().await.unwrap();
    let mut texts = [message_text(first), message_text(second)];
    texts.sort();
    assert_eq!(texts, ["from bob".to_string(), "from carol".to_string()]);
}

#[tokio::test]
async fn test_message_persisted_before_event_arrives() {
    let h = harness().await;
    let alice = h.seed_user("Alice").await;
    let bob = h.seed_user("Bob").await;
    let chat = h.service.create_chat(&alice.id, &bob.id).await.unwrap();

    let (alice_session, _alice_rx) = h.connect(&alice.id).await;
    let (bob_session, mut bob_rx) = h.connect(&bob.id).await;
    bob_session
        .handle(Command::Join {
            chat_id: chat.id.clone(),
        })
        .await
        .unwrap();

    alice_session
        .handle(Command::Message {
            chat_id: chat.id.clone(),
            text: Some("durable".to_string()),
            attachment_url: None,
        })
        .await
        .unwrap();

    // By the time the event is observable, a history refresh must already
    // include the message.
    let event = bob_rx.recv().await.unwrap();
    let history = h
        .service
        .get_message_history(&bob.id, &chat.id, None, 0)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    match event {
        RoomEvent::Message(msg) => assert_eq!(msg.id, history[0].id),
        other => panic!("expected message event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_typing_signals_are_not_persisted() {
    let h = harness().await;
    let alice = h.seed_user("Alice").await;
    let bob = h.seed_user("Bob").await;
    let chat = h.service.create_chat(&alice.id, &bob.id).await.unwrap();

    let (alice_session, _alice_rx) = h.connect(&alice.id).await;
    let (bob_session, mut bob_rx) = h.connect(&bob.id).await;
    bob_session
        .handle(Command::Join {
            chat_id: chat.id.clone(),
        })
        .await
        .unwrap();

    alice_session
        .handle(Command::Typing {
            chat_id: chat.id.clone(),
            is_typing: true,
        })
        .await
        .unwrap();

    assert!(matches!(
        bob_rx.recv().await,
        Some(RoomEvent::Typing { is_typing: true, .. })
    ));
    let history = h
        .service
        .get_message_history(&bob.id, &chat.id, None, 0)
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_handshake_with_query_token() {
    let h = harness().await;
    let alice = h.seed_user("Alice").await;

    let token = encode_token(JWT_SECRET, &JwtClaims::new(&alice.id, None, 3600)).unwrap();
    let meta = HandshakeMetadata {
        cookie_header: None,
        query: Some(format!("token={token}")),
    };

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let id = h
        .registry
        .connect(&meta, &h.extractor, &h.verifier, tx)
        .await
        .unwrap();
    let principal = h.registry.identity_of(id).await.unwrap();
    assert_eq!(principal.id, alice.id);
}

#[tokio::test]
async fn test_handshake_with_expired_token_rejected() {
    let h = harness().await;

    let now = chrono::Utc::now().timestamp() as u64;
    let claims = JwtClaims {
        sub: "ghost".to_string(),
        role: None,
        iat: now - 7200,
        exp: now - 3600,
    };
    let token = encode_token(JWT_SECRET, &claims).unwrap();
    let meta = HandshakeMetadata {
        cookie_header: Some(format!("accessToken={token}")),
        query: None,
    };

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let result = h.registry.connect(&meta, &h.extractor, &h.verifier, tx).await;
    assert!(result.is_err());
    assert_eq!(h.registry.connection_count().await, 0);
}

#[tokio::test]
async fn test_disconnected_member_does_not_block_others() {
    let h = harness().await;
    let alice = h.seed_user("Alice").await;
    let bob = h.seed_user("Bob").await;
    let chat = h.service.create_chat(&alice.id, &bob.id).await.unwrap();

    let (alice_session, _alice_rx) = h.connect(&alice.id).await;
    let (bob_session1, mut bob_rx1) = h.connect(&bob.id).await;
    let (bob_session2, mut bob_rx2) = h.connect(&bob.id).await;
    for session in [&bob_session1, &bob_session2] {
        session
            .handle(Command::Join {
                chat_id: chat.id.clone(),
            })
            .await
            .unwrap();
    }

    bob_session1.close().await;

    alice_session
        .handle(Command::Message {
            chat_id: chat.id.clone(),
            text: Some("still flowing".to_string()),
            attachment_url: None,
        })
        .await
        .unwrap();

    assert_eq!(message_text(bob_rx2.recv().await.unwrap()), "still flowing");
    assert!(bob_rx1.try_recv().is_err());
}
