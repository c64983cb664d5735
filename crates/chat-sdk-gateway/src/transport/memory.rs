//! In-process transport
//!
//! `MemoryConnector` hands every connection to a `MemoryListener` as a
//! `MemoryPeer`, which plays the server side: it pushes frames and close
//! codes to the session and reads what the session writes.

use super::{Connector, Inbound, Outbound, Transport, MESSAGE_BUFFER_SIZE};
use crate::error::TransportError;
use crate::protocol::GatewayMessage;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Connector whose connections land on a paired `MemoryListener`
#[derive(Debug)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refusing: AtomicBool,
    attempts: AtomicUsize,
}

/// Accepts connections made through a `MemoryConnector`
#[derive(Debug)]
pub struct MemoryListener {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryConnector {
    /// Create a connector and the listener that receives its connections
    #[must_use]
    pub fn pair() -> (Self, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers: tx,
            refusing: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        };
        (connector, MemoryListener { peers: rx })
    }

    /// Make connection attempts fail until turned off again
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Connection attempts so far, refused ones included
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Transport, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refusing.load(Ordering::SeqCst) {
            return Err(TransportError::Connect(format!("connection refused: {url}")));
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(MESSAGE_BUFFER_SIZE);
        let (inbound_tx, inbound_rx) = mpsc::channel(MESSAGE_BUFFER_SIZE);

        let peer = MemoryPeer {
            url: url.to_string(),
            outbound: outbound_rx,
            inbound: inbound_tx,
        };
        self.peers
            .send(peer)
            .map_err(|_| TransportError::Connect("listener dropped".to_string()))?;

        Ok(Transport::new(outbound_tx, inbound_rx))
    }
}

impl MemoryListener {
    /// Wait for the next connection; `None` once the connector is dropped
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// Take a connection that has already been made, if any
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers.try_recv().ok()
    }
}

/// Server side of one in-memory connection
#[derive(Debug)]
pub struct MemoryPeer {
    url: String,
    outbound: mpsc::Receiver<Outbound>,
    inbound: mpsc::Sender<Inbound>,
}

impl MemoryPeer {
    /// URL the session connected to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Push a frame to the session
    pub async fn send(&self, message: &GatewayMessage) -> Result<(), TransportError> {
        let text = message
            .to_json()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        self.send_text(text).await
    }

    /// Push raw text to the session
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.inbound
            .send(Inbound::Text(text.into()))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Report a socket fault, followed by an abnormal close
    pub async fn fail(&self, error: TransportError) -> Result<(), TransportError> {
        self.inbound
            .send(Inbound::Error(error))
            .await
            .map_err(|_| TransportError::Closed)?;
        self.close(crate::protocol::ABNORMAL_CLOSURE, "").await
    }

    /// Close the connection from the server side
    pub async fn close(&self, code: u16, reason: &str) -> Result<(), TransportError> {
        self.inbound
            .send(Inbound::Closed {
                code,
                reason: reason.to_string(),
            })
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Next item written by the session; `None` once it dropped the transport
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// Next frame written by the session, parsed.
    ///
    /// `None` when the session closes the connection or drops it.
    pub async fn next_message(&mut self) -> Option<GatewayMessage> {
        loop {
            match self.outbound.recv().await? {
                Outbound::Text(text) => {
                    if let Ok(message) = GatewayMessage::from_json(&text) {
                        return Some(message);
                    }
                }
                Outbound::Close { .. } => return None,
            }
        }
    }

    /// Whether the session has dropped its end
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (connector, mut listener) = MemoryConnector::pair();
        let mut transport = connector.connect("memory://gateway").await.unwrap();
        let mut peer = listener.accept().await.unwrap();
        assert_eq!(peer.url(), "memory://gateway");

        transport.send_text(r#"{"op":1,"d":null}"#.to_string()).unwrap();
        let frame = peer.next_message().await.unwrap();
        assert_eq!(frame, GatewayMessage::heartbeat(None));

        peer.send(&GatewayMessage::heartbeat_ack()).await.unwrap();
        assert!(matches!(transport.recv().await, Some(Inbound::Text(_))));

        peer.close(4000, "bye").await.unwrap();
        assert_eq!(
            transport.recv().await,
            Some(Inbound::Closed {
                code: 4000,
                reason: "bye".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_close_reaches_peer() {
        let (connector, mut listener) = MemoryConnector::pair();
        let transport = connector.connect("memory://gateway").await.unwrap();
        let mut peer = listener.accept().await.unwrap();

        transport.close(1000, "done");
        assert_eq!(
            peer.recv().await,
            Some(Outbound::Close {
                code: 1000,
                reason: "done".to_string()
            })
        );
        assert_eq!(peer.recv().await, None);
        assert!(peer.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_and_flush_waits_for_peer() {
        let (connector, mut listener) = MemoryConnector::pair();
        let transport = connector.connect("memory://gateway").await.unwrap();
        let mut peer = listener.accept().await.unwrap();

        let reader = tokio::spawn(async move {
            let frame = peer.recv().await;
            drop(peer);
            frame
        });
        let flushed = transport
            .close_and_flush(1000, "done", Duration::from_secs(1))
            .await;

        assert!(flushed);
        assert!(matches!(
            reader.await.unwrap(),
            Some(Outbound::Close { code: 1000, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_and_flush_gives_up() {
        let (connector, mut listener) = MemoryConnector::pair();
        let transport = connector.connect("memory://gateway").await.unwrap();
        let _peer = listener.accept().await.unwrap();

        let flushed = transport
            .close_and_flush(1000, "done", Duration::from_secs(1))
            .await;
        assert!(!flushed);
    }

    #[tokio::test]
    async fn test_refusing() {
        let (connector, mut listener) = MemoryConnector::pair();
        connector.set_refusing(true);

        assert!(matches!(
            connector.connect("memory://gateway").await,
            Err(TransportError::Connect(_))
        ));
        assert_eq!(connector.attempts(), 1);
        assert!(listener.try_accept().is_none());
    }
}
