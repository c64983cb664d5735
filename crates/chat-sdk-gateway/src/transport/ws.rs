//! WebSocket transport over tokio-tungstenite

use super::{Connector, Inbound, Outbound, Transport, MESSAGE_BUFFER_SIZE};
use crate::error::TransportError;
use crate::protocol::ABNORMAL_CLOSURE;
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, trace, warn};

/// Close frame without a status code
const NO_STATUS_RECEIVED: u16 = 1005;

/// Default time allowed for the TCP/TLS/upgrade handshake
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connects over `ws://` or `wss://`
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Transport, TransportError> {
        let (socket, response) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| TransportError::Connect(format!("timed out connecting to {url}")))?
                .map_err(|e| TransportError::Connect(e.to_string()))?;

        debug!(url = %url, status = %response.status(), "WebSocket connected");

        let (sink, stream) = socket.split();
        let (outbound_tx, outbound_rx) = mpsc::channel(MESSAGE_BUFFER_SIZE);
        let (inbound_tx, inbound_rx) = mpsc::channel(MESSAGE_BUFFER_SIZE);

        tokio::spawn(write_loop(sink, outbound_rx));
        tokio::spawn(read_loop(stream, inbound_tx));

        Ok(Transport::new(outbound_tx, inbound_rx))
    }
}

/// Forward socket frames to the session.
///
/// Always finishes with exactly one `Inbound::Closed`, unless the session
/// has already dropped its end.
async fn read_loop<S>(mut stream: S, inbound: mpsc::Sender<Inbound>)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let (code, reason) = loop {
        let next = tokio::select! {
            next = stream.next() => next,
            () = inbound.closed() => return,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                trace!(len = text.len(), "Frame received");
                if inbound.send(Inbound::Text(text)).await.is_err() {
                    return;
                }
            }
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => {
                    if inbound.send(Inbound::Text(text)).await.is_err() {
                        return;
                    }
                }
                Err(_) => debug!("Ignoring non-UTF-8 binary frame"),
            },
            Some(Ok(Message::Close(frame))) => {
                break frame.map_or_else(
                    || (NO_STATUS_RECEIVED, String::new()),
                    |frame| (u16::from(frame.code), frame.reason.into_owned()),
                );
            }
            Some(Ok(_)) => {
                // Ping/pong are answered by tungstenite
            }
            Some(Err(e)) => {
                warn!(error = %e, "WebSocket error");
                let _ = inbound
                    .send(Inbound::Error(TransportError::Io(e.to_string())))
                    .await;
                break (ABNORMAL_CLOSURE, e.to_string());
            }
            None => break (ABNORMAL_CLOSURE, "connection ended without close frame".to_string()),
        }
    };

    debug!(code, reason = %reason, "WebSocket closed");
    let _ = inbound.send(Inbound::Closed { code, reason }).await;
}

/// Write queued frames to the socket until closed
async fn write_loop<S>(mut sink: S, mut outbound: mpsc::Receiver<Outbound>)
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        match frame {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!(error = %e, "Failed to write frame");
                    break;
                }
            }
            Outbound::Close { code, reason } => {
                let frame = CloseFrame {
                    code: WsCloseCode::from(code),
                    reason: reason.into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!(error = %e, "Failed to write close frame");
                }
                break;
            }
        }
    }

    let _ = sink.close().await;
}
