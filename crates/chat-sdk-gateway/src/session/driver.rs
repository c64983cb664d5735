//! Session driver task
//!
//! One task owns the transport, heartbeat and session identity. Every
//! transition happens in a handler called from `run`, so nothing else ever
//! touches that state concurrently.

use super::{Command, SessionStatus, Shared};
use crate::backoff;
use crate::error::TransportError;
use crate::events::{Channel, CloseEvent, DispatchEvent, Event, EventName};
use crate::protocol::{
    classify, describe, CloseCode, GatewayMessage, IdentifyPayload, OpCode, ResumePayload,
    ABNORMAL_CLOSURE, NORMAL_CLOSURE,
};
use crate::transport::{Connector, Inbound, Transport};
use chat_sdk_common::GatewayConfig;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};

/// Close code for connections the client tears down but intends to resume
const RESUMABLE_TEARDOWN: u16 = 4000;

/// Floor for the server-dictated heartbeat interval
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// How long an open transport may stay silent before Hello
const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on flushing the close frame during shutdown
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

type ConnectFuture = Pin<Box<dyn Future<Output = Result<Transport, TransportError>> + Send>>;

struct Heartbeat {
    interval: Duration,
    next_beat: Instant,
    /// The last heartbeat sent was acknowledged (true before the first one)
    acked: bool,
    sent_at: Option<Instant>,
}

impl Heartbeat {
    fn start(interval: Duration) -> Self {
        Self {
            interval,
            next_beat: Instant::now() + backoff::first_heartbeat_delay(interval),
            acked: true,
            sent_at: None,
        }
    }
}

/// An open transport with a running heartbeat
struct Link {
    transport: Transport,
    heartbeat: Heartbeat,
}

enum Phase {
    Idle,
    Connecting(ConnectFuture),
    AwaitingHello { transport: Transport, deadline: Instant },
    Authenticating(Link),
    Ready(Link),
    Disconnected,
    ReconnectScheduled(Instant),
}

impl Phase {
    fn status(&self) -> SessionStatus {
        match self {
            Self::Idle => SessionStatus::Idle,
            Self::Connecting(_) => SessionStatus::Connecting,
            Self::AwaitingHello { .. } => SessionStatus::AwaitingHello,
            Self::Authenticating(_) => SessionStatus::Authenticating,
            Self::Ready(_) => SessionStatus::Ready,
            Self::Disconnected => SessionStatus::Disconnected,
            Self::ReconnectScheduled(_) => SessionStatus::ReconnectScheduled,
        }
    }

    fn transport(&self) -> Option<&Transport> {
        match self {
            Self::AwaitingHello { transport, .. } => Some(transport),
            Self::Authenticating(link) | Self::Ready(link) => Some(&link.transport),
            _ => None,
        }
    }

    fn into_transport(self) -> Option<Transport> {
        match self {
            Self::AwaitingHello { transport, .. } => Some(transport),
            Self::Authenticating(link) | Self::Ready(link) => Some(link.transport),
            _ => None,
        }
    }
}

enum Wake {
    Command(Option<Command>),
    Connected(Result<Transport, TransportError>),
    Inbound(Option<Inbound>),
    HelloDue,
    HeartbeatDue,
    ReconnectDue,
}

pub(super) struct Driver {
    config: GatewayConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    phase: Phase,
    session_id: Option<String>,
    sequence: Option<u64>,
    attempts: u32,
    /// `connect()` callers waiting for the handshake to settle
    pending: Vec<oneshot::Sender<()>>,
}

impl Driver {
    pub(super) fn new(
        config: GatewayConfig,
        connector: Arc<dyn Connector>,
        shared: Arc<Shared>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            config,
            connector,
            shared,
            commands,
            phase: Phase::Idle,
            session_id: None,
            sequence: None,
            attempts: 0,
            pending: Vec::new(),
        }
    }

    pub(super) async fn run(mut self) {
        loop {
            match self.next_wake().await {
                Wake::Command(Some(Command::Connect(done))) => self.handle_connect(done),
                Wake::Command(Some(Command::Send(frame))) => self.send_control(&frame),
                Wake::Command(Some(Command::Destroy)) => break,
                Wake::Command(None) => {
                    debug!("All session handles dropped");
                    break;
                }
                Wake::Connected(Ok(transport)) => self.on_open(transport),
                Wake::Connected(Err(e)) => {
                    warn!(error = %e, url = %self.config.url, "Failed to connect");
                    self.emit_error(e.clone());
                    self.on_closed(ABNORMAL_CLOSURE, e.to_string());
                }
                Wake::Inbound(Some(Inbound::Text(text))) => self.on_text(&text),
                Wake::Inbound(Some(Inbound::Error(e))) => {
                    warn!(error = %e, "Transport error");
                    self.emit_error(e);
                }
                Wake::Inbound(Some(Inbound::Closed { code, reason })) => self.on_closed(code, reason),
                Wake::Inbound(None) => self.on_closed(
                    ABNORMAL_CLOSURE,
                    "transport ended without close".to_string(),
                ),
                Wake::HelloDue => {
                    warn!(timeout_ms = HELLO_TIMEOUT.as_millis() as u64, "No hello received");
                    self.teardown(RESUMABLE_TEARDOWN, "Hello not received");
                }
                Wake::HeartbeatDue => self.on_heartbeat_due(),
                Wake::ReconnectDue => {
                    if !self.shared.destroyed.load(Ordering::SeqCst) {
                        self.begin_connect();
                    }
                }
            }
            self.publish();
        }

        self.shutdown().await;
    }

    async fn next_wake(&mut self) -> Wake {
        let commands = &mut self.commands;

        match &mut self.phase {
            Phase::Idle | Phase::Disconnected => Wake::Command(commands.recv().await),
            Phase::Connecting(connecting) => tokio::select! {
                biased;
                command = commands.recv() => Wake::Command(command),
                result = connecting => Wake::Connected(result),
            },
            Phase::AwaitingHello { transport, deadline } => tokio::select! {
                biased;
                command = commands.recv() => Wake::Command(command),
                inbound = transport.recv() => Wake::Inbound(inbound),
                () = sleep_until(*deadline) => Wake::HelloDue,
            },
            Phase::Authenticating(link) | Phase::Ready(link) => tokio::select! {
                biased;
                command = commands.recv() => Wake::Command(command),
                inbound = link.transport.recv() => Wake::Inbound(inbound),
                () = sleep_until(link.heartbeat.next_beat) => Wake::HeartbeatDue,
            },
            Phase::ReconnectScheduled(deadline) => tokio::select! {
                biased;
                command = commands.recv() => Wake::Command(command),
                () = sleep_until(*deadline) => Wake::ReconnectDue,
            },
        }
    }

    // === Commands ===

    fn handle_connect(&mut self, done: oneshot::Sender<()>) {
        match self.phase.status() {
            SessionStatus::Connecting
            | SessionStatus::AwaitingHello
            | SessionStatus::Authenticating => {
                debug!(status = ?self.phase.status(), "Handshake already in progress, ignoring connect");
                let _ = done.send(());
                return;
            }
            SessionStatus::Ready => {
                debug!("Replacing ready connection");
                if let Some(transport) = self.take_phase().into_transport() {
                    transport.close(RESUMABLE_TEARDOWN, "Reconnecting");
                }
                // No reconnect is scheduled; the connect below replaces it
                self.emit_close(RESUMABLE_TEARDOWN, "Reconnecting".to_string());
            }
            SessionStatus::Disconnected => {
                // Explicit connect after giving up starts a fresh retry budget
                self.attempts = 0;
            }
            SessionStatus::Idle | SessionStatus::ReconnectScheduled | SessionStatus::Destroyed => {}
        }

        self.pending.push(done);
        self.begin_connect();
    }

    fn send_control(&mut self, frame: &GatewayMessage) {
        match self.phase.transport() {
            Some(transport) => send_frame(transport, frame),
            None => warn!(op = %frame.op, status = ?self.phase.status(), "Transport not open, dropping frame"),
        }
    }

    // === Connection lifecycle ===

    fn begin_connect(&mut self) {
        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        info!(url = %url, attempt = self.attempts, "Connecting to gateway");

        self.phase = Phase::Connecting(Box::pin(async move { connector.connect(&url).await }));
    }

    fn on_open(&mut self, transport: Transport) {
        debug!("Transport open, awaiting hello");
        self.phase = Phase::AwaitingHello {
            transport,
            deadline: Instant::now() + HELLO_TIMEOUT,
        };
    }

    fn on_text(&mut self, text: &str) {
        let raw: Value = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Ignoring undecodable frame");
                return;
            }
        };

        // Watermark moves before anything is emitted, whatever the op
        if let Some(seq) = raw.get("s").and_then(Value::as_u64) {
            self.sequence = Some(self.sequence.map_or(seq, |current| current.max(seq)));
            self.publish();
        }

        let frame: GatewayMessage = match serde_json::from_value(raw) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Ignoring frame with unknown op");
                return;
            }
        };
        trace!(frame = %frame, "Frame received");

        match frame.op {
            OpCode::Hello => self.on_hello(&frame),
            OpCode::HeartbeatAck => self.on_heartbeat_ack(),
            OpCode::Heartbeat => {
                trace!("Server requested heartbeat");
                if let Some(transport) = self.phase.transport() {
                    send_frame(transport, &GatewayMessage::heartbeat(self.sequence));
                }
            }
            OpCode::Dispatch => self.on_dispatch(frame),
            OpCode::Reconnect => {
                info!("Server requested reconnect");
                self.teardown(RESUMABLE_TEARDOWN, "Server requested reconnect");
            }
            OpCode::InvalidSession => {
                let resumable = frame.is_resumable();
                warn!(resumable, "Session invalidated by server");
                if !resumable {
                    self.clear_session();
                }
                self.teardown(RESUMABLE_TEARDOWN, "Invalid session");
            }
            op => debug!(op = %op, "Ignoring unexpected op"),
        }
    }

    fn on_hello(&mut self, frame: &GatewayMessage) {
        if !matches!(self.phase, Phase::AwaitingHello { .. }) {
            debug!(status = ?self.phase.status(), "Ignoring hello outside handshake");
            return;
        }
        let Some(interval) = frame.hello_interval() else {
            warn!("Hello without heartbeat interval");
            self.teardown(CloseCode::DecodeError.as_u16(), "Malformed hello");
            return;
        };
        let Phase::AwaitingHello { transport, .. } = self.take_phase() else {
            return;
        };
        let interval = interval.max(MIN_HEARTBEAT_INTERVAL);

        debug!(interval_ms = interval.as_millis() as u64, "Hello received, starting heartbeat");
        let link = Link {
            transport,
            heartbeat: Heartbeat::start(interval),
        };

        let handshake = match &self.session_id {
            Some(session_id) => {
                info!(session_id = %session_id, seq = ?self.sequence, "Resuming session");
                GatewayMessage::resume(&ResumePayload {
                    token: self.config.token.clone(),
                    session_id: session_id.clone(),
                    seq: self.sequence.unwrap_or(0),
                })
            }
            None => {
                debug!("Identifying");
                GatewayMessage::identify(&IdentifyPayload {
                    token: self.config.token.clone(),
                    properties: (&self.config.properties).into(),
                    presence: (&self.config.presence).into(),
                    ignored_events: self.config.ignored_events.clone(),
                })
            }
        };
        send_frame(&link.transport, &handshake);

        self.phase = Phase::Authenticating(link);
    }

    fn on_dispatch(&mut self, frame: GatewayMessage) {
        match frame.t.as_deref() {
            Some("READY") => {
                self.session_id = frame.ready_session_id();
                if self.session_id.is_none() {
                    warn!("READY without session_id; next reconnect will identify");
                }
                self.complete_handshake(false);
            }
            Some("RESUMED") => self.complete_handshake(true),
            Some(_) => {}
            None => {
                debug!("Dispatch without event name");
                return;
            }
        }

        let GatewayMessage { t, s, d, .. } = frame;
        let name = t.unwrap_or_default();
        let channel = match EventName::parse(&name) {
            Some(_) if self.config.is_ignored(&name) => {
                trace!(event = %name, "Ignored event, raw only");
                None
            }
            Some(known) => Some(Channel::Dispatch(known)),
            None => {
                trace!(event = %name, "Unknown event, raw only");
                None
            }
        };

        let event = Event::Dispatch(DispatchEvent {
            name,
            sequence: s,
            data: d,
        });
        self.shared.emitter.emit(Channel::Raw, &event);
        if let Some(channel) = channel {
            self.shared.emitter.emit(channel, &event);
        }
    }

    fn complete_handshake(&mut self, resumed: bool) {
        let link = match self.take_phase() {
            Phase::Authenticating(link) | Phase::Ready(link) => link,
            other => {
                debug!(status = ?other.status(), resumed, "Handshake completion outside handshake");
                self.phase = other;
                return;
            }
        };
        self.phase = Phase::Ready(link);
        self.attempts = 0;

        info!(
            session_id = self.session_id.as_deref().unwrap_or(""),
            seq = ?self.sequence,
            resumed,
            "Gateway session ready"
        );

        self.publish();
        for done in self.pending.drain(..) {
            let _ = done.send(());
        }
    }

    // === Heartbeat ===

    fn on_heartbeat_due(&mut self) {
        let (Phase::Authenticating(link) | Phase::Ready(link)) = &mut self.phase else {
            return;
        };

        if !link.heartbeat.acked {
            warn!("Heartbeat not acknowledged, connection is a zombie");
            self.teardown(RESUMABLE_TEARDOWN, "Heartbeat not acknowledged");
            return;
        }

        let now = Instant::now();
        link.heartbeat.acked = false;
        link.heartbeat.sent_at = Some(now);
        link.heartbeat.next_beat = now + link.heartbeat.interval;
        send_frame(&link.transport, &GatewayMessage::heartbeat(self.sequence));
    }

    fn on_heartbeat_ack(&mut self) {
        let (Phase::Authenticating(link) | Phase::Ready(link)) = &mut self.phase else {
            return;
        };

        link.heartbeat.acked = true;
        if let Some(sent_at) = link.heartbeat.sent_at {
            let ping = sent_at.elapsed();
            trace!(ping_ms = ping.as_millis() as u64, "Heartbeat acknowledged");
            self.shared.snapshot.write().ping = Some(ping);
        }
    }

    // === Disconnect ===

    /// Close the transport from this side and run the close path
    fn teardown(&mut self, code: u16, reason: &str) {
        if let Some(transport) = self.take_phase().into_transport() {
            transport.close(code, reason);
        }
        self.on_closed(code, reason.to_string());
    }

    fn on_closed(&mut self, code: u16, reason: String) {
        // Dropping the phase drops the transport and stops the heartbeat
        drop(self.take_phase());
        self.phase = Phase::Disconnected;

        let reason = if reason.is_empty() {
            describe(code).to_string()
        } else {
            reason
        };
        info!(code, reason = %reason, "Gateway connection closed");

        self.publish();
        self.emit_close(code, reason.clone());

        // A close during the handshake settles waiting callers without error
        for done in self.pending.drain(..) {
            let _ = done.send(());
        }

        let disposition = classify(code);
        if disposition.clear_session {
            self.clear_session();
        }
        if !disposition.reconnect {
            error!(code, reason = %reason, "Gateway closed with terminal code, not reconnecting");
            return;
        }

        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return;
        }
        if matches!(self.phase, Phase::ReconnectScheduled(_)) {
            debug!("Reconnect already scheduled");
            return;
        }
        if self.attempts >= self.config.max_reconnect_attempts {
            error!(
                attempts = self.attempts,
                "Reconnect attempts exhausted, staying disconnected"
            );
            return;
        }

        self.attempts += 1;
        let delay = backoff::reconnect_delay(self.attempts, self.config.reconnect_base_delay());
        info!(
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        self.phase = Phase::ReconnectScheduled(Instant::now() + delay);
    }

    fn clear_session(&mut self) {
        if let Some(session_id) = self.session_id.take() {
            debug!(session_id = %session_id, "Clearing session");
        }
        self.sequence = None;
    }

    async fn shutdown(&mut self) {
        self.shared.destroyed.store(true, Ordering::SeqCst);

        let transport = self.take_phase().into_transport();

        {
            let mut snapshot = self.shared.snapshot.write();
            snapshot.status = SessionStatus::Destroyed;
            snapshot.ping = None;
        }
        // Dropping the senders fails any pending connect() with Destroyed
        self.pending.clear();

        if let Some(transport) = transport {
            self.emit_close(NORMAL_CLOSURE, "Client destroyed".to_string());
            if !transport
                .close_and_flush(NORMAL_CLOSURE, "Client destroyed", CLOSE_FLUSH_TIMEOUT)
                .await
            {
                debug!("Close frame not flushed before timeout");
            }
        }

        info!("Gateway session destroyed");
        self.shared.stopped.send_replace(true);
    }

    // === Helpers ===

    fn take_phase(&mut self) -> Phase {
        std::mem::replace(&mut self.phase, Phase::Idle)
    }

    fn emit_close(&self, code: u16, reason: String) {
        self.shared
            .emitter
            .emit(Channel::Close, &Event::Close(CloseEvent { code, reason }));
    }

    fn emit_error(&self, error: TransportError) {
        self.shared.emitter.emit(Channel::Error, &Event::Error(error));
    }

    /// Mirror driver state into the shared snapshot
    fn publish(&self) {
        let status = self.phase.status();
        let previous = {
            let mut snapshot = self.shared.snapshot.write();
            let previous = snapshot.status;
            // destroy() marks the snapshot before the driver stops
            if previous == SessionStatus::Destroyed {
                return;
            }
            snapshot.status = status;
            snapshot.session_id.clone_from(&self.session_id);
            snapshot.sequence = self.sequence;
            snapshot.reconnect_attempts = self.attempts;
            previous
        };

        if previous != status {
            debug!(from = ?previous, to = ?status, "Session state changed");
            self.shared
                .emitter
                .emit(Channel::Debug, &Event::Debug(format!("{previous:?} -> {status:?}")));
        }
    }
}

fn send_frame(transport: &Transport, frame: &GatewayMessage) {
    let text = match frame.to_json() {
        Ok(text) => text,
        Err(e) => {
            warn!(op = %frame.op, error = %e, "Failed to encode frame");
            return;
        }
    };
    trace!(frame = %frame, "Sending frame");
    if let Err(e) = transport.send_text(text) {
        warn!(op = %frame.op, error = %e, "Failed to send frame");
    }
}
