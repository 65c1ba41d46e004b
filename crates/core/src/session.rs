//! Session state machine.
//!
//! A [`Bridge`] owns at most one session at a time. Each `connect()` tears the
//! previous session down and starts a new one:
//!
//! 1. Disconnected: no transport.
//! 2. Connecting: transport created, waiting for the bridge's `Ready` handshake.
//!    Outbound messages are queued.
//! 3. Ready: `clientID` bound from the handshake and the socket open. The queue
//!    has been flushed in FIFO order before `connected` fired.
//! 4. Disconnected again once the socket closes or `connect()` is called again.
//!
//! Inbound frames are processed by a pump task spawned per session. Sessions
//! carry a generation number so a stale transport's late events are ignored.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bridge_protocol::{Envelope, MessageType, Payload, RESERVED_FIELDS, Request};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::BridgeOptions;
use crate::error::{Error, Result};
use crate::events::{BridgeEvent, EventDispatcher, Listener};
use crate::queue::SendQueue;
use crate::replies::ReplyCorrelator;
use crate::transport::{ReadyState, Transport, TransportEvent};

/// Where the bridge is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	Disconnected,
	Connecting,
	Ready,
}

/// Client endpoint for the game bridge.
///
/// Cheap to clone; clones share the same session.
///
/// ```ignore
/// let bridge = Bridge::new();
/// bridge.on(Listener::connected(|| println!("connected")));
/// bridge.connect()?;
///
/// let camera = bridge.request(&CameraQuery {}).await?;
/// println!("camera at {}, {}", camera.x, camera.y);
/// ```
#[derive(Clone)]
pub struct Bridge {
	inner: Arc<Inner>,
}

struct Inner {
	options: BridgeOptions,
	state: Mutex<State>,
	replies: ReplyCorrelator,
	events: EventDispatcher,
}

#[derive(Default)]
struct State {
	session: Option<Session>,
	queue: SendQueue,
	generation: u64,
}

struct Session {
	generation: u64,
	transport: Box<dyn Transport>,
	/// Empty until the handshake binds it.
	client_id: String,
}

impl Session {
	fn is_ready(&self) -> bool {
		self.transport.ready_state() == ReadyState::Open && !self.client_id.is_empty()
	}
}

impl Default for Bridge {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Bridge {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Bridge")
			.field("url", &self.inner.options.url())
			.field("state", &self.state())
			.field("pending_replies", &self.pending_replies())
			.finish()
	}
}

impl Bridge {
	/// Bridge on the default port using the WebSocket transport.
	pub fn new() -> Self {
		Self::with_options(BridgeOptions::default())
	}

	pub fn with_options(options: BridgeOptions) -> Self {
		Self {
			inner: Arc::new(Inner {
				options,
				state: Mutex::new(State::default()),
				replies: ReplyCorrelator::default(),
				events: EventDispatcher::default(),
			}),
		}
	}

	pub fn options(&self) -> &BridgeOptions {
		&self.inner.options
	}

	/// Starts a new session, discarding the current one.
	///
	/// The previous transport is closed, `disconnected(true)` fires if there
	/// was one, and its pending replies fail with [`Error::ConnectionClosed`].
	/// Then a new transport is opened and `connecting` fires. The session
	/// becomes ready when the bridge's handshake arrives.
	///
	/// Must be called from within a tokio runtime.
	pub fn connect(&self) -> Result<()> {
		Handle::try_current().map_err(|_| Error::NoRuntime)?;
		self.inner.tear_down(None, true);

		let url = self.inner.options.url();
		let parts = self.inner.options.transport_factory.open(&url)?;
		let generation = {
			let mut state = self.inner.state.lock();
			state.generation += 1;
			let generation = state.generation;
			state.session = Some(Session {
				generation,
				transport: parts.transport,
				client_id: String::new(),
			});
			generation
		};

		info!(target = "bridge.session", %url, generation, "bridge connecting");
		self.inner.events.dispatch(&BridgeEvent::Connecting);
		tokio::spawn(pump(Arc::downgrade(&self.inner), generation, parts.events));
		Ok(())
	}

	/// Closes the current session. Pending replies fail with [`Error::ConnectionClosed`].
	pub fn disconnect(&self) {
		self.inner.tear_down(None, false);
	}

	/// `true` once the handshake bound a session id and the socket is open.
	pub fn is_ready(&self) -> bool {
		self.inner.state.lock().session.as_ref().is_some_and(Session::is_ready)
	}

	/// `true` while a transport exists but the session is not ready.
	pub fn is_connecting(&self) -> bool {
		self.state() == ConnectionState::Connecting
	}

	pub fn state(&self) -> ConnectionState {
		match self.inner.state.lock().session.as_ref() {
			None => ConnectionState::Disconnected,
			Some(session) if session.is_ready() => ConnectionState::Ready,
			Some(_) => ConnectionState::Connecting,
		}
	}

	/// Session id assigned by the bridge's handshake.
	pub fn client_id(&self) -> Option<String> {
		let state = self.inner.state.lock();
		state.session.as_ref().map(|s| s.client_id.clone()).filter(|id| !id.is_empty())
	}

	/// Subscribes `listener`. Returns `false` if it was already subscribed.
	pub fn on(&self, listener: Listener) -> bool {
		self.inner.events.subscribe(listener)
	}

	/// Unsubscribes `listener`. Returns `false` if it was not subscribed.
	pub fn off(&self, listener: &Listener) -> bool {
		self.inner.events.unsubscribe(listener)
	}

	/// Number of requests waiting for a reply.
	pub fn pending_replies(&self) -> usize {
		self.inner.replies.len()
	}

	/// Number of messages waiting for the handshake.
	pub fn queued_messages(&self) -> usize {
		self.inner.state.lock().queue.len()
	}

	/// Sends `payload`, or queues it until the session is ready.
	///
	/// Returns the envelope as built, whether or not it was written yet.
	pub fn send<P: Payload>(&self, payload: &P) -> Result<Envelope> {
		self.send_raw(P::TYPE, serde_json::to_value(payload)?)
	}

	/// Sends an untyped payload. A `replyTo` string in `payload` becomes the
	/// envelope's correlation id; envelope fields in `payload` are ignored.
	pub fn send_raw(&self, message_type: MessageType, payload: Value) -> Result<Envelope> {
		self.write_envelope(message_type, payload, |_| ()).map(|(envelope, ())| envelope)
	}

	/// Answers an inbound request.
	pub fn reply<P: Payload>(&self, request: &Envelope, payload: &P) -> Result<Envelope> {
		let mut payload = serde_json::to_value(payload)?;
		if let Value::Object(fields) = &mut payload {
			fields.insert("replyTo".to_string(), Value::String(request.id.clone()));
		}
		self.send_raw(P::TYPE, payload)
	}

	/// Sends `payload` and waits for the envelope that replies to it.
	///
	/// Fails with [`Error::Timeout`] after `timeout` (the configured default
	/// when `None`), with [`Error::ConnectionClosed`] if the session is torn
	/// down first, or with [`Error::Remote`] if the bridge answers with an
	/// `Error` message.
	pub async fn send_and_wait_for_reply<P: Payload>(&self, payload: &P, timeout: Option<Duration>) -> Result<Envelope> {
		self.send_raw_and_wait_for_reply(P::TYPE, serde_json::to_value(payload)?, timeout).await
	}

	pub async fn send_raw_and_wait_for_reply(&self, message_type: MessageType, payload: Value, timeout: Option<Duration>) -> Result<Envelope> {
		let timeout = timeout.unwrap_or(self.inner.options.reply_timeout);
		let replies = &self.inner.replies;
		let (_sent, reply) = self.write_envelope(message_type, payload, |envelope| replies.register(&envelope.id, timeout))?;
		reply.await.unwrap_or(Err(Error::ConnectionClosed))
	}

	/// Sends a request and decodes its typed reply.
	pub async fn request<R: Request>(&self, payload: &R) -> Result<R::Reply> {
		let reply = self.send_and_wait_for_reply(payload, None).await?;
		Ok(reply.decode::<R::Reply>()?)
	}

	/// Builds the envelope, runs `before_write` on it, then writes or queues it.
	fn write_envelope<T>(&self, message_type: MessageType, payload: Value, before_write: impl FnOnce(&Envelope) -> T) -> Result<(Envelope, T)> {
		let (reply_to, fields) = payload_fields(message_type, payload)?;

		let mut state = self.inner.state.lock();
		let State { session, queue, .. } = &mut *state;
		let client_id = session.as_ref().map(|s| s.client_id.clone()).unwrap_or_default();
		let envelope = Envelope::new((self.inner.options.id_generator)(), message_type, client_id, fields).with_reply_to(reply_to);
		let text = serde_json::to_string(&envelope)?;
		let extra = before_write(&envelope);

		match session.as_ref().filter(|s| s.is_ready()) {
			Some(session) => {
				debug!(target = "bridge.session", id = %envelope.id, %message_type, "send message");
				if let Err(err) = session.transport.send(text) {
					self.inner.replies.settle(&envelope.id, Err(Error::ConnectionClosed));
					return Err(err);
				}
			}
			None => {
				debug!(target = "bridge.session", id = %envelope.id, %message_type, queued = queue.len() + 1, "queue message until ready");
				queue.push(envelope.id.clone(), text);
			}
		}
		Ok((envelope, extra))
	}

	#[cfg(test)]
	fn generation(&self) -> u64 {
		self.inner.state.lock().generation
	}
}

impl Inner {
	fn is_current(&self, generation: u64) -> bool {
		self.state.lock().session.as_ref().is_some_and(|s| s.generation == generation)
	}

	/// Processes one inbound text frame of session `generation`.
	///
	/// Malformed frames are logged and dropped. Protocol violations are
	/// returned before the `message` event fires.
	fn handle_text(&self, generation: u64, text: &str) -> Result<()> {
		let envelope: Envelope = match serde_json::from_str(text) {
			Ok(envelope) => envelope,
			Err(err) => {
				warn!(target = "bridge.session", error = %err, "dropping malformed bridge message");
				return Ok(());
			}
		};
		debug!(target = "bridge.session", id = %envelope.id, message_type = %envelope.message_type, "bridge message");

		let handshake = {
			let mut state = self.state.lock();
			let State { session, queue, .. } = &mut *state;
			let Some(session) = session.as_mut().filter(|s| s.generation == generation) else {
				return Ok(());
			};

			let mut handshake = false;
			if envelope.message_type == MessageType::Ready {
				if !session.client_id.is_empty() {
					return Err(Error::DuplicateHandshake(envelope.client_id.clone()));
				}
				if envelope.client_id.is_empty() {
					return Err(Error::InvalidHandshake);
				}
				session.client_id = envelope.client_id.clone();
				let transport = &session.transport;
				if let Err(err) = queue.flush(|text| transport.send(text.to_string())) {
					warn!(target = "bridge.session", error = %err, unsent = queue.len(), "flush interrupted; unsent messages stay queued");
				}
				handshake = true;
			}
			if !envelope.client_id.is_empty() && envelope.client_id != session.client_id {
				return Err(Error::SessionMismatch {
					expected: session.client_id.clone(),
					received: envelope.client_id.clone(),
				});
			}
			handshake
		};

		if handshake {
			info!(target = "bridge.session", client_id = %envelope.client_id, generation, "bridge ready");
			self.events.dispatch(&BridgeEvent::Connected);
		}

		if let Some(reply_to) = envelope.reply_to.as_deref() {
			let result = if envelope.message_type == MessageType::Error {
				Err(Error::Remote(envelope.error_text().unwrap_or("bridge returned an error").to_string()))
			} else {
				Ok(envelope.clone())
			};
			if !self.replies.settle(reply_to, result) {
				return Err(Error::UnsolicitedReply {
					reply_to: reply_to.to_string(),
					message: text.to_string(),
				});
			}
		}

		self.events.dispatch(&BridgeEvent::Message(envelope));
		Ok(())
	}

	/// Closes the session (only if it is `only_generation`, when given), emits
	/// `disconnected`, and rejects every pending reply.
	///
	/// Pending replies are rejected under the state lock, so a session
	/// installed by a concurrent `connect()` never loses its own requests.
	fn tear_down(&self, only_generation: Option<u64>, reconnecting: bool) {
		let session = {
			let mut state = self.state.lock();
			let current = state.session.as_ref().map(|s| s.generation);
			if only_generation.is_some() && only_generation != current {
				return;
			}
			let session = state.session.take();

			let rejected = self.replies.reject_all(|| Error::ConnectionClosed);
			if !rejected.is_empty() {
				// their replies could only arrive as unsolicited now
				let discarded = state.queue.discard(&rejected);
				debug!(target = "bridge.session", rejected = rejected.len(), discarded, "rejected pending replies");
			}
			session
		};

		if let Some(session) = session {
			session.transport.close();
			info!(target = "bridge.session", generation = session.generation, reconnecting, "bridge disconnected");
			self.events.dispatch(&BridgeEvent::Disconnected { reconnecting });
		}
	}
}

/// Reads inbound transport events for one session until it closes.
async fn pump(inner: Weak<Inner>, generation: u64, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
	while let Some(event) = events.recv().await {
		let Some(inner) = inner.upgrade() else {
			return;
		};
		if !inner.is_current(generation) {
			return;
		}

		match event {
			TransportEvent::Open => info!(target = "bridge.session", generation, "bridge open"),
			TransportEvent::Text(text) => {
				if let Err(err) = inner.handle_text(generation, &text) {
					error!(target = "bridge.session", generation, error = %err, "failed to process bridge message");
				}
			}
			TransportEvent::Binary(data) => {
				warn!(target = "bridge.session", len = data.len(), "ignoring unexpected binary bridge message");
			}
			TransportEvent::Error(err) => warn!(target = "bridge.session", generation, error = %err, "bridge socket error"),
			TransportEvent::Close { code, reason } => {
				let reason = if reason.is_empty() { "No reason given" } else { reason.as_str() };
				info!(target = "bridge.session", generation, code, reason, "bridge closed");
				inner.tear_down(Some(generation), false);
				return;
			}
		}
	}

	// event channel ended without a close event
	if let Some(inner) = inner.upgrade() {
		inner.tear_down(Some(generation), false);
	}
}

/// Splits a payload into its correlation id and the remaining fields.
fn payload_fields(message_type: MessageType, payload: Value) -> Result<(Option<String>, Map<String, Value>)> {
	let mut fields = match payload {
		Value::Object(fields) => fields,
		Value::Null => Map::new(),
		other => {
			return Err(Error::InvalidPayload {
				message_type: message_type.to_string(),
				found: json_kind(&other),
			});
		}
	};
	for key in RESERVED_FIELDS {
		fields.remove(key);
	}
	let reply_to = match fields.remove("replyTo") {
		Some(Value::String(id)) => Some(id),
		_ => None,
	};
	Ok((reply_to, fields))
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}
