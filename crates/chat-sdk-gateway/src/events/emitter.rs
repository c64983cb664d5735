//! Subscription registry
//!
//! Listeners are keyed by channel. Emission snapshots the listener list and
//! releases the lock before calling out, so a listener may subscribe or
//! unsubscribe from inside its own callback.

use super::{Channel, Event};
use crate::error::{GatewayError, GatewayResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, warn};

/// Subscriber callback
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by `on`/`once`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry {
    id: ListenerId,
    once: bool,
    listener: Listener,
}

/// Event subscription registry
#[derive(Default)]
pub struct EventEmitter {
    listeners: RwLock<HashMap<Channel, Vec<Entry>>>,
    next_id: AtomicU64,
}

impl EventEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event on `channel`
    pub fn on<F>(&self, channel: impl Into<Channel>, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(channel.into(), Arc::new(listener), false)
    }

    /// Subscribe to the next event on `channel` only
    pub fn once<F>(&self, channel: impl Into<Channel>, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(channel.into(), Arc::new(listener), true)
    }

    fn register(&self, channel: Channel, listener: Listener, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(channel)
            .or_default()
            .push(Entry { id, once, listener });
        id
    }

    /// Unsubscribe. Returns false if the listener was already gone.
    pub fn off(&self, channel: impl Into<Channel>, id: ListenerId) -> bool {
        let channel = channel.into();
        let mut listeners = self.listeners.write();
        let Some(entries) = listeners.get_mut(&channel) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&channel);
        }
        removed
    }

    pub fn listener_count(&self, channel: impl Into<Channel>) -> usize {
        self.listeners
            .read()
            .get(&channel.into())
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener on `channel`, in subscription order.
    ///
    /// A panicking listener is logged and skipped. Returns how many listeners
    /// were called.
    pub fn emit(&self, channel: Channel, event: &Event) -> usize {
        let snapshot: Vec<Listener> = {
            let mut listeners = self.listeners.write();
            let Some(entries) = listeners.get_mut(&channel) else {
                if channel == Channel::Error {
                    warn!(event = ?event, "Gateway error with no error listener");
                }
                return 0;
            };

            let snapshot: Vec<Listener> = entries.iter().map(|e| Arc::clone(&e.listener)).collect();
            entries.retain(|entry| !entry.once);
            if entries.is_empty() {
                listeners.remove(&channel);
            }
            snapshot
        };

        for listener in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(channel = %channel, "Event listener panicked");
            }
        }
        snapshot.len()
    }

    /// Resolve with the next event on `channel` accepted by `filter`.
    ///
    /// Fails with `WaitTimeout` when `timeout` elapses first. The temporary
    /// listener is removed on every exit path, including cancellation.
    pub async fn wait_for<F>(
        &self,
        channel: impl Into<Channel>,
        filter: F,
        timeout: Option<Duration>,
    ) -> GatewayResult<Event>
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        let channel = channel.into();
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));

        let id = self.on(channel, move |event| {
            if !filter(event) {
                return;
            }
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(event.clone());
            }
        });
        let _guard = Unsubscribe {
            emitter: self,
            channel,
            id,
        };

        let received = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, rx).await.map_err(|_| {
                GatewayError::WaitTimeout {
                    event: channel.to_string(),
                    timeout,
                }
            })?,
            None => rx.await,
        };

        // The sender lives in the listener, which only goes away with the guard
        received.map_err(|_| GatewayError::Destroyed)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("EventEmitter")
            .field("channels", &listeners.len())
            .field("listeners", &listeners.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

struct Unsubscribe<'a> {
    emitter: &'a EventEmitter,
    channel: Channel,
    id: ListenerId,
}

impl Drop for Unsubscribe<'_> {
    fn drop(&mut self) {
        self.emitter.off(self.channel, self.id);
    }
}
