//! Fake transport for unit testing the session manager.
//!
//! Provides an in-memory transport so handshakes, reply correlation and
//! teardown can be exercised without a bridge.
//!
//! # Example
//!
//! ```ignore
//! let factory = FakeTransportFactory::new();
//! let bridge = Bridge::with_options(BridgeOptions::default().transport_factory(factory.clone()));
//! bridge.connect()?;
//!
//! let conn = factory.latest().unwrap();
//! conn.open();
//! conn.inject_ready("abc");
//! let sent = conn.take_sent();
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::{ReadyState, ReadyStateCell, Transport, TransportEvent, TransportFactory, TransportParts};
use crate::error::{Error, Result};

/// Factory that records every transport it opens.
#[derive(Debug, Clone, Default)]
pub struct FakeTransportFactory {
	connections: Arc<Mutex<Vec<FakeConnection>>>,
}

impl FakeTransportFactory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Controller for the `index`-th opened transport.
	pub fn connection(&self, index: usize) -> Option<FakeConnection> {
		self.connections.lock().get(index).cloned()
	}

	/// Controller for the most recently opened transport.
	pub fn latest(&self) -> Option<FakeConnection> {
		self.connections.lock().last().cloned()
	}

	/// Number of transports opened so far.
	pub fn opened(&self) -> usize {
		self.connections.lock().len()
	}
}

impl TransportFactory for FakeTransportFactory {
	fn open(&self, url: &str) -> Result<TransportParts> {
		let (event_tx, event_rx) = mpsc::unbounded_channel();
		let connection = FakeConnection {
			url: Arc::from(url),
			state: ReadyStateCell::new(ReadyState::Connecting),
			events: event_tx,
			sent: Arc::new(Mutex::new(Vec::new())),
		};
		self.connections.lock().push(connection.clone());

		Ok(TransportParts {
			transport: Box::new(FakeTransport { connection }),
			events: event_rx,
		})
	}
}

/// Remote end of a fake transport: injects events and inspects sent frames.
#[derive(Debug, Clone)]
pub struct FakeConnection {
	url: Arc<str>,
	state: ReadyStateCell,
	events: mpsc::UnboundedSender<TransportEvent>,
	sent: Arc<Mutex<Vec<String>>>,
}

impl FakeConnection {
	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn ready_state(&self) -> ReadyState {
		self.state.get()
	}

	/// Completes the socket handshake.
	pub fn open(&self) {
		self.state.set(ReadyState::Open);
		self.inject(TransportEvent::Open);
	}

	/// Inject a raw transport event.
	pub fn inject(&self, event: TransportEvent) {
		let _ = self.events.send(event);
	}

	/// Inject a text frame.
	pub fn inject_text(&self, text: impl Into<String>) {
		self.inject(TransportEvent::Text(text.into()));
	}

	/// Inject a JSON message as a text frame.
	pub fn inject_json(&self, message: Value) {
		self.inject_text(message.to_string());
	}

	/// Inject a binary frame.
	pub fn inject_binary(&self, data: impl Into<Vec<u8>>) {
		self.inject(TransportEvent::Binary(data.into()));
	}

	/// Inject the bridge's `Ready` handshake assigning `client_id`.
	pub fn inject_ready(&self, client_id: &str) {
		self.inject_json(json!({
			"id": format!("ready-{client_id}"),
			"when": "2024-05-01T12:00:00.000Z",
			"clientID": client_id,
			"type": "Ready",
		}));
	}

	/// Inject a reply of `message_type` to request `reply_to` with extra payload fields.
	pub fn inject_reply(&self, client_id: &str, reply_to: &str, message_type: &str, payload: Value) {
		let mut message = json!({
			"id": format!("reply-{reply_to}"),
			"when": "2024-05-01T12:00:00.000Z",
			"clientID": client_id,
			"type": message_type,
			"replyTo": reply_to,
		});
		if let (Some(target), Value::Object(fields)) = (message.as_object_mut(), payload) {
			target.extend(fields);
		}
		self.inject_json(message);
	}

	/// Inject an `Error` reply.
	pub fn inject_error(&self, client_id: &str, reply_to: &str, error: &str) {
		self.inject_reply(client_id, reply_to, "Error", json!({ "error": error }));
	}

	/// Close the socket from the bridge side.
	pub fn close_remote(&self, code: u16, reason: &str) {
		self.state.set(ReadyState::Closed);
		self.inject(TransportEvent::Close {
			code,
			reason: reason.to_string(),
		});
	}

	/// Take all sent frames parsed as JSON, clearing the buffer.
	pub fn take_sent(&self) -> Vec<Value> {
		std::mem::take(&mut *self.sent.lock())
			.into_iter()
			.map(|text| serde_json::from_str(&text).unwrap_or(Value::String(text)))
			.collect()
	}

	/// Number of frames sent and not yet taken.
	pub fn sent_count(&self) -> usize {
		self.sent.lock().len()
	}
}

struct FakeTransport {
	connection: FakeConnection,
}

impl Transport for FakeTransport {
	fn ready_state(&self) -> ReadyState {
		self.connection.state.get()
	}

	fn send(&self, text: String) -> Result<()> {
		let state = self.connection.state.get();
		if state != ReadyState::Open {
			return Err(Error::Transport(format!("cannot send while socket is {state:?}")));
		}
		self.connection.sent.lock().push(text);
		Ok(())
	}

	fn close(&self) {
		if self.connection.state.get() == ReadyState::Closed {
			return;
		}
		self.connection.state.set(ReadyState::Closed);
		self.connection.inject(TransportEvent::Close {
			code: 1000,
			reason: "closed by client".to_string(),
		});
	}
}
