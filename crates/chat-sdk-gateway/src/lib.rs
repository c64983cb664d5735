//! # chat-sdk-gateway
//!
//! Client side of the real-time gateway: handshake, heartbeat, resume and
//! reconnect over a WebSocket, with typed event delivery.
//!
//! ```no_run
//! use chat_sdk_common::GatewayConfig;
//! use chat_sdk_gateway::{EventName, GatewaySession};
//!
//! # async fn demo() -> chat_sdk_gateway::GatewayResult<()> {
//! let session = GatewaySession::websocket(GatewayConfig::new("wss://gateway.example", "token"));
//! session.on(EventName::MessageCreate, |event| println!("{:?}", event.data()));
//! session.connect().await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod error;
pub mod events;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::{GatewayError, GatewayResult, TransportError};
pub use events::{
    Channel, CloseEvent, DispatchEvent, Event, EventEmitter, EventName, ListenerId,
};
pub use protocol::{GatewayMessage, OpCode};
pub use session::{GatewaySession, SessionSnapshot, SessionStatus, WeakGatewaySession};
pub use transport::{Connector, MemoryConnector, Transport, WsConnector};
