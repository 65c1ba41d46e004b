//! Lifecycle and message events.
//!
//! Four fixed channels, each with its own ordered subscriber list. Dispatch
//! is synchronous and runs in subscription order. A subscriber that panics is
//! logged and skipped; the remaining subscribers still run.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use bridge_protocol::Envelope;
use parking_lot::Mutex;
use tracing::error;

type Callback = Arc<dyn Fn() + Send + Sync>;
type DisconnectedCallback = Arc<dyn Fn(bool) + Send + Sync>;
type MessageCallback = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// An event emitted by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
	/// A new transport was created and is connecting.
	Connecting,
	/// The handshake completed and queued messages were flushed.
	Connected,
	/// The transport went away. `reconnecting` is `true` when a new
	/// `connect()` replaced it.
	Disconnected { reconnecting: bool },
	/// Any inbound message, including replies and the handshake.
	Message(Envelope),
}

impl BridgeEvent {
	pub fn name(&self) -> &'static str {
		match self {
			BridgeEvent::Connecting => "connecting",
			BridgeEvent::Connected => "connected",
			BridgeEvent::Disconnected { .. } => "disconnected",
			BridgeEvent::Message(_) => "message",
		}
	}
}

/// A subscriber for one event channel.
///
/// Identity is the callback allocation: clones of a listener are the same
/// subscriber, two listeners built from the same closure are not.
///
/// ```ignore
/// let on_message = Listener::message(|msg| println!("{}", msg.message_type));
/// bridge.on(on_message.clone());
/// bridge.off(&on_message);
/// ```
#[derive(Clone)]
pub enum Listener {
	Connecting(Callback),
	Connected(Callback),
	Disconnected(DisconnectedCallback),
	Message(MessageCallback),
}

impl Listener {
	pub fn connecting(f: impl Fn() + Send + Sync + 'static) -> Self {
		Listener::Connecting(Arc::new(f))
	}

	pub fn connected(f: impl Fn() + Send + Sync + 'static) -> Self {
		Listener::Connected(Arc::new(f))
	}

	pub fn disconnected(f: impl Fn(bool) + Send + Sync + 'static) -> Self {
		Listener::Disconnected(Arc::new(f))
	}

	pub fn message(f: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
		Listener::Message(Arc::new(f))
	}
}

impl fmt::Debug for Listener {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let channel = match self {
			Listener::Connecting(_) => "connecting",
			Listener::Connected(_) => "connected",
			Listener::Disconnected(_) => "disconnected",
			Listener::Message(_) => "message",
		};
		f.debug_tuple("Listener").field(&channel).finish()
	}
}

#[derive(Default)]
struct Subscribers {
	connecting: Vec<Callback>,
	connected: Vec<Callback>,
	disconnected: Vec<DisconnectedCallback>,
	message: Vec<MessageCallback>,
}

/// Per-channel subscriber lists.
#[derive(Default)]
pub(crate) struct EventDispatcher {
	subscribers: Mutex<Subscribers>,
}

impl EventDispatcher {
	/// Adds `listener` unless it is already subscribed. Returns whether it was added.
	pub(crate) fn subscribe(&self, listener: Listener) -> bool {
		let mut subs = self.subscribers.lock();
		match listener {
			Listener::Connecting(f) => insert_unique(&mut subs.connecting, f),
			Listener::Connected(f) => insert_unique(&mut subs.connected, f),
			Listener::Disconnected(f) => insert_unique(&mut subs.disconnected, f),
			Listener::Message(f) => insert_unique(&mut subs.message, f),
		}
	}

	/// Removes the first subscription matching `listener`. Returns whether one was found.
	pub(crate) fn unsubscribe(&self, listener: &Listener) -> bool {
		let mut subs = self.subscribers.lock();
		match listener {
			Listener::Connecting(f) => remove_first(&mut subs.connecting, f),
			Listener::Connected(f) => remove_first(&mut subs.connected, f),
			Listener::Disconnected(f) => remove_first(&mut subs.disconnected, f),
			Listener::Message(f) => remove_first(&mut subs.message, f),
		}
	}

	/// Calls every subscriber of the event's channel in subscription order.
	///
	/// The subscriber list is snapshotted first, so callbacks may subscribe,
	/// unsubscribe, or call back into the bridge.
	pub(crate) fn dispatch(&self, event: &BridgeEvent) {
		match event {
			BridgeEvent::Connecting => {
				let subs = self.subscribers.lock().connecting.clone();
				for f in subs {
					guarded(event, || f());
				}
			}
			BridgeEvent::Connected => {
				let subs = self.subscribers.lock().connected.clone();
				for f in subs {
					guarded(event, || f());
				}
			}
			BridgeEvent::Disconnected { reconnecting } => {
				let subs = self.subscribers.lock().disconnected.clone();
				for f in subs {
					guarded(event, || f(*reconnecting));
				}
			}
			BridgeEvent::Message(envelope) => {
				let subs = self.subscribers.lock().message.clone();
				for f in subs {
					guarded(event, || f(envelope));
				}
			}
		}
	}

	#[cfg(test)]
	fn count(&self) -> usize {
		let subs = self.subscribers.lock();
		subs.connecting.len() + subs.connected.len() + subs.disconnected.len() + subs.message.len()
	}
}

fn insert_unique<T: ?Sized>(list: &mut Vec<Arc<T>>, f: Arc<T>) -> bool {
	if list.iter().any(|existing| Arc::ptr_eq(existing, &f)) {
		return false;
	}
	list.push(f);
	true
}

fn remove_first<T: ?Sized>(list: &mut Vec<Arc<T>>, f: &Arc<T>) -> bool {
	match list.iter().position(|existing| Arc::ptr_eq(existing, f)) {
		Some(index) => {
			list.remove(index);
			true
		}
		None => false,
	}
}

fn guarded(event: &BridgeEvent, f: impl FnOnce()) {
	if catch_unwind(AssertUnwindSafe(f)).is_err() {
		error!(target = "bridge.events", event = event.name(), "event subscriber panicked");
	}
}
