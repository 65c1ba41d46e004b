//! Error types for the bridge client.

use bridge_protocol::DecodeError;
use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the bridge.
#[derive(Debug, Error)]
pub enum Error {
	/// A `Ready` handshake arrived after the session id was bound.
	#[error("Unexpected bridge Ready message with clientID {0:?}")]
	DuplicateHandshake(String),

	/// A `Ready` handshake carried no session id.
	#[error("Bridge Ready message did not assign a clientID")]
	InvalidHandshake,

	/// An inbound message carried a session id other than the bound one.
	#[error("Unexpected bridge clientID {received:?} (session is {expected:?})")]
	SessionMismatch { expected: String, received: String },

	/// A reply referenced a request that is not pending.
	#[error("Unexpected reply to {reply_to}: {message}")]
	UnsolicitedReply { reply_to: String, message: String },

	/// No reply arrived before the request's deadline.
	#[error("Message timed out while waiting for a response")]
	Timeout,

	/// The connection went away while the request was pending.
	#[error("Bridge connection was closed")]
	ConnectionClosed,

	/// The bridge answered with an `Error` message.
	#[error("{0}")]
	Remote(String),

	/// A reply could not be viewed as the expected payload type.
	#[error(transparent)]
	Decode(#[from] DecodeError),

	/// Payload did not serialize to a JSON object.
	#[error("Invalid payload for {message_type}: expected a JSON object, got {found}")]
	InvalidPayload { message_type: String, found: &'static str },

	/// Underlying socket failure.
	#[error("Transport error: {0}")]
	Transport(String),

	/// The default transport needs a tokio runtime to run its socket task.
	#[error("No tokio runtime available for the bridge socket; call connect() from within a runtime or provide a transport factory")]
	NoRuntime,

	/// Invalid configuration value.
	#[error("Invalid configuration: {0}")]
	Config(String),

	/// JSON serialization failure.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns `true` for errors that indicate the peer broke the session protocol.
	pub fn is_protocol_violation(&self) -> bool {
		matches!(
			self,
			Error::DuplicateHandshake(_) | Error::InvalidHandshake | Error::SessionMismatch { .. } | Error::UnsolicitedReply { .. }
		)
	}

	/// Returns `true` when a request expired without a reply.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout)
	}

	/// Returns `true` when the request failed because the connection closed.
	pub fn is_connection_closed(&self) -> bool {
		matches!(self, Error::ConnectionClosed)
	}
}
