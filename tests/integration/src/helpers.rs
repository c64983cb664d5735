//! Test helpers for integration tests
//!
//! Provides a mock gateway bound to a local port. Every WebSocket the
//! session opens is handed to the test as a `MockConnection`, which plays
//! the server side of the protocol step by step.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chat_sdk_common::{try_init_tracing_with_config, GatewayConfig, TracingConfig};
use chat_sdk_gateway::{GatewayMessage, OpCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

/// Heartbeat interval announced in Hello
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(45);

/// Upper bound on any single wait in a test
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

type Connections = mpsc::UnboundedSender<WebSocket>;

/// Mock gateway server instance
pub struct MockGateway {
    pub addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<WebSocket>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    /// Start a mock gateway on an ephemeral port
    pub async fn start() -> Result<Self> {
        init_test_tracing();

        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new()
            .route("/gateway", get(gateway_handler))
            .with_state(tx);

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            connections: rx,
            _handle: handle,
        })
    }

    /// WebSocket URL of the gateway endpoint
    pub fn url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    /// Session configuration pointing at this gateway, with short backoff
    pub fn config(&self, token: &str) -> GatewayConfig {
        GatewayConfig::new(self.url(), token)
            .with_reconnect_base_delay(Duration::from_millis(50))
            .with_max_reconnect_attempts(3)
    }

    /// Wait for the next connection and greet it with Hello
    pub async fn accept(&mut self) -> Result<MockConnection> {
        let socket = timeout(TEST_TIMEOUT, self.connections.recv())
            .await
            .context("timed out waiting for a connection")?
            .context("mock gateway stopped")?;

        let mut connection = MockConnection { socket };
        connection
            .send(&GatewayMessage::hello(HEARTBEAT_INTERVAL))
            .await?;
        Ok(connection)
    }

    /// Whether any connection arrives within `wait`
    pub async fn accepts_within(&mut self, wait: Duration) -> bool {
        matches!(timeout(wait, self.connections.recv()).await, Ok(Some(_)))
    }
}

async fn gateway_handler(
    State(connections): State<Connections>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        if connections.send(socket).is_err() {
            tracing::warn!("Mock gateway dropped, discarding connection");
        }
    })
}

/// Server side of one client connection
pub struct MockConnection {
    socket: WebSocket,
}

impl MockConnection {
    /// Send a frame to the client
    pub async fn send(&mut self, message: &GatewayMessage) -> Result<()> {
        self.socket.send(Message::Text(message.to_json()?)).await?;
        Ok(())
    }

    /// Send a dispatch event
    pub async fn dispatch(&mut self, name: &str, seq: u64, data: Value) -> Result<()> {
        self.send(&GatewayMessage::dispatch(name, seq, data)).await
    }

    /// Complete an Identify with READY
    pub async fn ready(&mut self, session_id: &str, seq: u64) -> Result<()> {
        self.dispatch("READY", seq, json!({ "session_id": session_id, "v": 9 }))
            .await
    }

    /// Next frame from the client; `None` once it closed the connection
    pub async fn next_message(&mut self) -> Result<Option<GatewayMessage>> {
        loop {
            let next = timeout(TEST_TIMEOUT, self.socket.recv())
                .await
                .context("timed out waiting for a frame")?;

            match next {
                Some(Ok(Message::Text(text))) => return Ok(Some(GatewayMessage::from_json(&text)?)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Next frame with the given op, skipping heartbeats
    pub async fn expect_op(&mut self, op: OpCode) -> Result<GatewayMessage> {
        loop {
            let frame = self
                .next_message()
                .await?
                .context("client closed the connection")?;
            if frame.op == op {
                return Ok(frame);
            }
            anyhow::ensure!(frame.op == OpCode::Heartbeat, "unexpected frame {frame}");
        }
    }

    /// Close code the client sends, skipping any frames before it
    pub async fn expect_close(&mut self) -> Result<Option<u16>> {
        loop {
            let next = timeout(TEST_TIMEOUT, self.socket.recv())
                .await
                .context("timed out waiting for close")?;

            match next {
                Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| f.code)),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    /// Close the connection from the server side
    pub async fn close(mut self, code: u16, reason: &str) -> Result<()> {
        self.socket
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: reason.to_string().into(),
            })))
            .await?;
        Ok(())
    }
}

/// Poll `condition` until it holds or the test timeout passes
pub async fn eventually(mut condition: impl FnMut() -> bool) -> Result<()> {
    let deadline = Instant::now() + TEST_TIMEOUT;
    while !condition() {
        anyhow::ensure!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

/// Install a subscriber once per test binary
pub fn init_test_tracing() {
    // Fails after the first call; that is fine
    let _ = try_init_tracing_with_config(TracingConfig::development());
}
