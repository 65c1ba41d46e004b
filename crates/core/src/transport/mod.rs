//! Socket transport seam.
//!
//! The session manager never touches a socket directly. It asks a
//! [`TransportFactory`] for a [`Transport`] handle plus a channel of
//! [`TransportEvent`]s and reacts to those events. Two implementations ship
//! with the crate:
//!
//! - [`WebSocketConnector`]: the default, a `tokio-tungstenite` client.
//! - [`FakeTransportFactory`]: an in-memory transport for tests.

mod fake;
mod websocket;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;

use crate::error::Result;

pub use fake::{FakeConnection, FakeTransportFactory};
pub use websocket::WebSocketConnector;

/// Connection state of a transport, mirroring the WebSocket `readyState` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
	Connecting = 0,
	Open = 1,
	Closing = 2,
	Closed = 3,
}

impl ReadyState {
	fn from_u8(value: u8) -> Self {
		match value {
			0 => ReadyState::Connecting,
			1 => ReadyState::Open,
			2 => ReadyState::Closing,
			_ => ReadyState::Closed,
		}
	}
}

/// Ready state shared between a transport handle and its I/O task.
#[derive(Debug, Clone)]
pub struct ReadyStateCell(Arc<AtomicU8>);

impl ReadyStateCell {
	pub fn new(state: ReadyState) -> Self {
		Self(Arc::new(AtomicU8::new(state as u8)))
	}

	pub fn get(&self) -> ReadyState {
		ReadyState::from_u8(self.0.load(Ordering::SeqCst))
	}

	pub fn set(&self, state: ReadyState) {
		self.0.store(state as u8, Ordering::SeqCst);
	}
}

/// Something that happened on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	/// The socket finished opening.
	Open,
	/// A text frame arrived.
	Text(String),
	/// A binary frame arrived.
	Binary(Vec<u8>),
	/// A socket-level error; a `Close` follows when the socket is done.
	Error(String),
	/// The socket closed. Always the last event of a transport.
	Close { code: u16, reason: String },
}

/// Handle to one socket connection.
pub trait Transport: Send + Sync {
	fn ready_state(&self) -> ReadyState;

	/// Queues a text frame for writing. Fails unless the socket is open.
	fn send(&self, text: String) -> Result<()>;

	/// Starts closing the socket. Calling it more than once has no effect.
	fn close(&self);
}

/// A freshly opened transport and the channel its events arrive on.
pub struct TransportParts {
	pub transport: Box<dyn Transport>,
	pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl fmt::Debug for TransportParts {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TransportParts")
			.field("ready_state", &self.transport.ready_state())
			.finish_non_exhaustive()
	}
}

/// Creates transports; injected through [`BridgeOptions`](crate::BridgeOptions).
pub trait TransportFactory: Send + Sync {
	/// Starts connecting to `url`. The connection completes asynchronously and
	/// reports [`TransportEvent::Open`] once usable.
	fn open(&self, url: &str) -> Result<TransportParts>;
}

impl<F> TransportFactory for F
where
	F: Fn(&str) -> Result<TransportParts> + Send + Sync,
{
	fn open(&self, url: &str) -> Result<TransportParts> {
		self(url)
	}
}
