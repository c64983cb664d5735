//! Duplex transport abstraction
//!
//! A `Transport` is a pair of bounded channels to a connection task. The
//! session only ever sees text frames in and out plus one terminal
//! `Inbound::Closed`, whatever carries them underneath.

mod memory;
mod ws;

pub use memory::{MemoryConnector, MemoryListener, MemoryPeer};
pub use ws::WsConnector;

use crate::error::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Channel buffer size for frames in each direction
pub const MESSAGE_BUFFER_SIZE: usize = 100;

/// Frame from the remote end
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Text(String),
    /// Socket fault; always followed by `Closed`
    Error(TransportError),
    /// Last item a transport delivers
    Closed { code: u16, reason: String },
}

/// Frame to the remote end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Close the connection; nothing is written after it
    Close { code: u16, reason: String },
}

/// A live connection, exclusively owned by one session
#[derive(Debug)]
pub struct Transport {
    outbound: mpsc::Sender<Outbound>,
    inbound: mpsc::Receiver<Inbound>,
}

impl Transport {
    /// Wrap the channel ends of a connection task
    pub fn new(outbound: mpsc::Sender<Outbound>, inbound: mpsc::Receiver<Inbound>) -> Self {
        Self { outbound, inbound }
    }

    /// Queue a text frame without waiting
    pub fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.outbound
            .try_send(Outbound::Text(text))
            .map_err(|e| match e {
                TrySendError::Full(_) => TransportError::Io("outbound buffer full".to_string()),
                TrySendError::Closed(_) => TransportError::Closed,
            })
    }

    /// Close the connection and drop it
    pub fn close(self, code: u16, reason: impl Into<String>) {
        let _ = self.outbound.try_send(Outbound::Close {
            code,
            reason: reason.into(),
        });
    }

    /// Close the connection and wait for the connection task to let go of
    /// its end, which happens once the close frame is written.
    ///
    /// Returns `false` if that takes longer than `timeout`.
    pub async fn close_and_flush(
        self,
        code: u16,
        reason: impl Into<String>,
        timeout: Duration,
    ) -> bool {
        let Self { outbound, inbound } = self;
        drop(inbound);

        let close = Outbound::Close {
            code,
            reason: reason.into(),
        };
        if outbound.try_send(close).is_err() {
            return outbound.is_closed();
        }
        tokio::time::timeout(timeout, outbound.closed()).await.is_ok()
    }

    /// Next inbound item; `None` once the connection task is gone
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }
}

/// Opens transports to a gateway URL
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Transport, TransportError>;
}
