//! Gateway session
//!
//! `GatewaySession` is a cheap, cloneable handle. The connection itself is
//! run by a driver task that owns the transport, the heartbeat and the
//! session identity; the handle talks to it over a command channel and reads
//! a snapshot of its state.
//!
//! The driver stops once every handle is dropped. Listeners are owned by the
//! session, so a listener that needs to call back into it should capture a
//! [`WeakGatewaySession`] rather than a clone; a strong clone keeps the
//! driver alive until `destroy()`.

mod driver;

use crate::error::{GatewayError, GatewayResult};
use crate::events::{Channel, Event, EventEmitter, ListenerId};
use crate::protocol::{
    CallConnectPayload, GatewayMessage, GuildSubscriptionsPayload, PresencePayload,
    RequestGuildMembersPayload, VoiceStatePayload,
};
use crate::transport::{Connector, WsConnector};
use chat_sdk_common::GatewayConfig;
use driver::Driver;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info_span, warn, Instrument};

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// Never connected
    #[default]
    Idle,
    /// Opening the transport
    Connecting,
    /// Transport open, waiting for Hello
    AwaitingHello,
    /// Identify or Resume sent, waiting for READY or RESUMED
    Authenticating,
    Ready,
    /// Closed, no reconnect pending
    Disconnected,
    /// Closed, reconnect timer running
    ReconnectScheduled,
    /// `destroy()` was called; terminal
    Destroyed,
}

/// Point-in-time view of the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub sequence: Option<u64>,
    /// Round trip of the last acknowledged heartbeat
    pub ping: Option<Duration>,
    pub reconnect_attempts: u32,
}

pub(crate) enum Command {
    Connect(oneshot::Sender<()>),
    Send(GatewayMessage),
    Destroy,
}

pub(crate) struct Shared {
    emitter: EventEmitter,
    snapshot: RwLock<SessionSnapshot>,
    destroyed: AtomicBool,
    /// Flipped by the driver as its last act
    stopped: watch::Sender<bool>,
}

/// Handle to a gateway session
#[derive(Clone)]
pub struct GatewaySession {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl GatewaySession {
    /// Create a session and start its driver task. Nothing connects until
    /// `connect()` is called.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn new(config: GatewayConfig, connector: Arc<dyn Connector>) -> Self {
        let shared = Arc::new(Shared {
            emitter: EventEmitter::new(),
            snapshot: RwLock::new(SessionSnapshot::default()),
            destroyed: AtomicBool::new(false),
            stopped: watch::Sender::new(false),
        });
        let (tx, rx) = mpsc::unbounded_channel();

        let span = info_span!("gateway", url = %config.url);
        let driver = Driver::new(config, connector, Arc::clone(&shared), rx);
        tokio::spawn(driver.run().instrument(span));

        Self {
            shared,
            commands: tx,
        }
    }

    /// Create a session that connects over WebSocket
    pub fn websocket(config: GatewayConfig) -> Self {
        Self::new(config, Arc::new(WsConnector::new()))
    }

    /// Open the connection and wait for the handshake to settle.
    ///
    /// Resolves once the session is ready (identified or resumed), or when
    /// the connection closes before that; reconnection is then handled
    /// internally. Returns immediately while a handshake is already in
    /// progress. Fails only if the session has been destroyed.
    pub async fn connect(&self) -> GatewayResult<()> {
        if self.is_destroyed() {
            return Err(GatewayError::Destroyed);
        }

        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Connect(tx))
            .map_err(|_| GatewayError::Destroyed)?;
        rx.await.map_err(|_| GatewayError::Destroyed)
    }

    /// Close the connection for good. Pending timers are cancelled and no
    /// reconnect will ever be scheduled again. Idempotent.
    pub fn destroy(&self) {
        if self.shared.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.snapshot.write().status = SessionStatus::Destroyed;
        let _ = self.commands.send(Command::Destroy);
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::SeqCst)
    }

    /// Wait until the driver has stopped, after `destroy()` or once every
    /// other handle is gone. An open connection has had its close frame
    /// written (or given up on) by then.
    pub async fn closed(&self) {
        let mut stopped = self.shared.stopped.subscribe();
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }

    /// A handle that does not keep the session alive
    pub fn downgrade(&self) -> WeakGatewaySession {
        WeakGatewaySession {
            shared: Arc::downgrade(&self.shared),
            commands: self.commands.downgrade(),
        }
    }

    // === Observers ===

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot.read().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.snapshot.read().status
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared.snapshot.read().session_id.clone()
    }

    /// Last sequence number seen
    pub fn sequence(&self) -> Option<u64> {
        self.shared.snapshot.read().sequence
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn ping(&self) -> Option<Duration> {
        self.shared.snapshot.read().ping
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.snapshot.read().reconnect_attempts
    }

    // === Subscriptions ===

    pub fn events(&self) -> &EventEmitter {
        &self.shared.emitter
    }

    pub fn on<F>(&self, channel: impl Into<Channel>, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.emitter.on(channel, listener)
    }

    pub fn once<F>(&self, channel: impl Into<Channel>, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.emitter.once(channel, listener)
    }

    pub fn off(&self, channel: impl Into<Channel>, id: ListenerId) -> bool {
        self.shared.emitter.off(channel, id)
    }

    /// Wait for the next event on `channel` accepted by `filter`; see
    /// [`EventEmitter::wait_for`].
    pub async fn wait_for<F>(
        &self,
        channel: impl Into<Channel>,
        filter: F,
        timeout: Option<Duration>,
    ) -> GatewayResult<Event>
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.shared.emitter.wait_for(channel, filter, timeout).await
    }

    // === Control frames ===
    //
    // Fire and forget: written if the transport is open, otherwise dropped
    // with a warning. Callers re-issue state after a reconnect if needed.

    /// Send an arbitrary client frame
    pub fn send(&self, frame: GatewayMessage) {
        if self.commands.send(Command::Send(frame)).is_err() {
            warn!("Session destroyed, dropping frame");
        }
    }

    pub fn update_presence(&self, presence: &PresencePayload) {
        self.send(GatewayMessage::presence_update(presence));
    }

    pub fn request_guild_members(&self, request: &RequestGuildMembersPayload) {
        self.send(GatewayMessage::request_guild_members(request));
    }

    pub fn update_voice_state(&self, voice_state: &VoiceStatePayload) {
        self.send(GatewayMessage::voice_state_update(voice_state));
    }

    pub fn call_connect(&self, channel_id: impl Into<String>) {
        self.send(GatewayMessage::call_connect(&CallConnectPayload {
            channel_id: channel_id.into(),
        }));
    }

    pub fn subscribe_guild(&self, subscription: &GuildSubscriptionsPayload) {
        self.send(GatewayMessage::guild_subscriptions(subscription));
    }
}

/// Non-owning session handle, for listeners that call back into the session
#[derive(Clone)]
pub struct WeakGatewaySession {
    shared: Weak<Shared>,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl WeakGatewaySession {
    /// `None` once every strong handle is gone
    pub fn upgrade(&self) -> Option<GatewaySession> {
        Some(GatewaySession {
            shared: self.shared.upgrade()?,
            commands: self.commands.upgrade()?,
        })
    }
}

impl std::fmt::Debug for WeakGatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakGatewaySession").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySession")
            .field("snapshot", &*self.shared.snapshot.read())
            .finish()
    }
}
