//! Gateway events
//!
//! Event names, the payloads delivered to subscribers and the subscription
//! registry the session emits through.

mod emitter;
mod names;
mod types;

pub use emitter::{EventEmitter, Listener, ListenerId};
pub use names::EventName;
pub use types::{Channel, CloseEvent, DispatchEvent, Event};
