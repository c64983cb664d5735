//! Gateway Integration Tests
//!
//! Drive a real WebSocket session against the in-process mock gateway.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::Arc;
use std::time::Duration;

use chat_sdk_gateway::protocol::{IdentifyPayload, PresencePayload, ResumePayload};
use chat_sdk_gateway::{Event, EventName, GatewaySession, OpCode, SessionStatus};
use chat_sdk_ratelimit::{RateLimiter, ScopeParams};
use integration_tests::{eventually, fixtures::*, MockConnection, MockGateway, TEST_TIMEOUT};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

/// Connect `session` and complete a fresh handshake on the mock side
async fn connect_ready(
    gateway: &mut MockGateway,
    session: &GatewaySession,
    session_id: &str,
) -> MockConnection {
    let connecting = tokio::spawn({
        let session = session.clone();
        async move { session.connect().await }
    });

    let mut conn = gateway.accept().await.unwrap();
    conn.expect_op(OpCode::Identify).await.unwrap();
    conn.ready(session_id, 1).await.unwrap();

    timeout(TEST_TIMEOUT, connecting)
        .await
        .expect("connect did not settle")
        .unwrap()
        .unwrap();
    conn
}

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_identify_then_ready() {
    let mut gateway = MockGateway::start().await.unwrap();
    let session = GatewaySession::websocket(gateway.config("integration-token"));

    let connecting = tokio::spawn({
        let session = session.clone();
        async move { session.connect().await }
    });

    let mut conn = gateway.accept().await.unwrap();
    let identify = conn.expect_op(OpCode::Identify).await.unwrap();
    let payload: IdentifyPayload = identify.payload().unwrap();
    assert_eq!(payload.token, "integration-token");
    assert_eq!(payload.presence.status, "online");

    let id = session_id();
    conn.ready(&id, 1).await.unwrap();
    connecting.await.unwrap().unwrap();

    assert_eq!(session.status(), SessionStatus::Ready);
    assert_eq!(session.session_id(), Some(id));
    assert_eq!(session.sequence(), Some(1));

    session.destroy();
}

#[tokio::test]
async fn test_dispatch_delivered_to_listener() {
    let mut gateway = MockGateway::start().await.unwrap();
    let session = GatewaySession::websocket(gateway.config("integration-token"));

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.on(EventName::MessageCreate, move |event: &Event| {
        let _ = tx.send(event.clone());
    });

    let mut conn = connect_ready(&mut gateway, &session, &session_id()).await;
    conn.dispatch("MESSAGE_CREATE", 2, message_create("channel-1", "hello"))
        .await
        .unwrap();

    let event = timeout(TEST_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    let dispatch = event.as_dispatch().unwrap();
    assert_eq!(dispatch.sequence, Some(2));
    assert_eq!(dispatch.data["content"], "hello");
    assert_eq!(dispatch.data["channel_id"], "channel-1");

    session.destroy();
}

// ============================================================================
// Reconnect Tests
// ============================================================================

#[tokio::test]
async fn test_resume_after_resumable_close() {
    let mut gateway = MockGateway::start().await.unwrap();
    let session = GatewaySession::websocket(gateway.config("integration-token"));

    let id = session_id();
    let mut conn = connect_ready(&mut gateway, &session, &id).await;
    conn.dispatch("MESSAGE_CREATE", 2, message_create("channel-1", "before"))
        .await
        .unwrap();
    eventually(|| session.sequence() == Some(2)).await.unwrap();

    conn.close(4000, "Unknown error").await.unwrap();

    let mut conn = gateway.accept().await.unwrap();
    let resume = conn.expect_op(OpCode::Resume).await.unwrap();
    let payload: ResumePayload = resume.payload().unwrap();
    assert_eq!(payload.session_id, id);
    assert_eq!(payload.seq, 2);

    conn.dispatch("RESUMED", 3, serde_json::json!({})).await.unwrap();
    eventually(|| session.status() == SessionStatus::Ready)
        .await
        .unwrap();

    assert_eq!(session.session_id(), Some(id));
    assert_eq!(session.sequence(), Some(3));
    assert_eq!(session.reconnect_attempts(), 0);

    session.destroy();
}

#[tokio::test]
async fn test_authentication_failure_does_not_reconnect() {
    let mut gateway = MockGateway::start().await.unwrap();
    let session = GatewaySession::websocket(gateway.config("bad-token"));

    let conn = connect_ready(&mut gateway, &session, &session_id()).await;
    conn.close(4004, "Authentication failed").await.unwrap();

    eventually(|| session.status() == SessionStatus::Disconnected)
        .await
        .unwrap();
    assert_eq!(session.session_id(), None);
    assert!(!gateway.accepts_within(Duration::from_millis(500)).await);

    session.destroy();
}

#[tokio::test]
async fn test_destroy_closes_normally() {
    let mut gateway = MockGateway::start().await.unwrap();
    let session = GatewaySession::websocket(gateway.config("integration-token"));

    let mut conn = connect_ready(&mut gateway, &session, &session_id()).await;
    session.destroy();

    assert_eq!(conn.expect_close().await.unwrap(), Some(1000));
    assert_eq!(session.status(), SessionStatus::Destroyed);
    assert!(session.connect().await.is_err());
    assert!(!gateway.accepts_within(Duration::from_millis(300)).await);
}

// ============================================================================
// Rate Limited Control Frames
// ============================================================================

#[tokio::test]
async fn test_presence_updates_paced_by_limiter() {
    let mut gateway = MockGateway::start().await.unwrap();
    let session = GatewaySession::websocket(gateway.config("integration-token"));
    let limiter = Arc::new(RateLimiter::new(true).with_routes(routes()));

    let mut conn = connect_ready(&mut gateway, &session, &session_id()).await;

    let start = Instant::now();
    for status in ["idle", "dnd", "online"] {
        limiter
            .acquire_route("update-presence", &ScopeParams::new())
            .await;
        session.update_presence(&PresencePayload::new(status));
    }
    // Two fit in the window; the third waited for the first to age out
    assert!(start.elapsed() >= Duration::from_millis(290));

    for expected in ["idle", "dnd", "online"] {
        let frame = conn.expect_op(OpCode::PresenceUpdate).await.unwrap();
        assert_eq!(frame.d["status"], expected);
    }

    session.destroy();
}
