//! The envelope every bridge message is wrapped in.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::message::{MessageType, Payload};

/// Envelope fields that payloads may not override.
pub const RESERVED_FIELDS: [&str; 4] = ["id", "when", "clientID", "type"];

/// A single bridge message.
///
/// Format on the wire:
/// ```json
/// {
///   "id": "6f1c0c1e-...",
///   "when": "2024-05-01T12:00:00.000Z",
///   "clientID": "abc",
///   "type": "CameraResponse",
///   "replyTo": "0b9d...",
///   "x": 10.5, "y": -3, "zoom": 8
/// }
/// ```
///
/// Everything except the envelope fields is kept in `payload` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	/// Globally unique message id.
	pub id: String,
	/// Creation timestamp as sent on the wire.
	pub when: String,
	/// Session id assigned by the bridge; empty until the handshake.
	#[serde(rename = "clientID", default, deserialize_with = "null_as_empty")]
	pub client_id: String,
	#[serde(rename = "type")]
	pub message_type: MessageType,
	/// Id of the request this message answers.
	#[serde(rename = "replyTo", default, skip_serializing_if = "Option::is_none")]
	pub reply_to: Option<String>,
	/// Type-specific fields, flattened into the envelope.
	#[serde(flatten)]
	pub payload: Map<String, Value>,
}

/// Failure to view an envelope as a specific payload type.
#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("Message was not of type {expected}: got {actual} (id {id})")]
	WrongType { expected: MessageType, actual: MessageType, id: String },

	#[error("Invalid {message_type} payload: {source}")]
	Payload {
		message_type: MessageType,
		#[source]
		source: serde_json::Error,
	},
}

impl Envelope {
	/// Builds an envelope stamped with the current time.
	pub fn new(id: impl Into<String>, message_type: MessageType, client_id: impl Into<String>, payload: Map<String, Value>) -> Self {
		Self {
			id: id.into(),
			when: now_timestamp(),
			client_id: client_id.into(),
			message_type,
			reply_to: None,
			payload,
		}
	}

	/// Sets the correlation id.
	pub fn with_reply_to(mut self, reply_to: Option<String>) -> Self {
		self.reply_to = reply_to;
		self
	}

	/// Parses `when`, if the peer sent a valid RFC 3339 timestamp.
	pub fn timestamp(&self) -> Option<DateTime<Utc>> {
		DateTime::parse_from_rfc3339(&self.when).ok().map(|t| t.with_timezone(&Utc))
	}

	/// Returns `true` when this envelope carries a `P`.
	pub fn is<P: Payload>(&self) -> bool {
		self.message_type == P::TYPE
	}

	/// Deserializes the payload fields as `P` after checking the type tag.
	pub fn decode<P: Payload>(&self) -> Result<P, DecodeError> {
		if !self.is::<P>() {
			return Err(DecodeError::WrongType {
				expected: P::TYPE,
				actual: self.message_type,
				id: self.id.clone(),
			});
		}
		serde_json::from_value(Value::Object(self.payload.clone())).map_err(|source| DecodeError::Payload {
			message_type: self.message_type,
			source,
		})
	}

	/// Text of an `Error` message.
	pub fn error_text(&self) -> Option<&str> {
		self.payload.get("error").and_then(Value::as_str)
	}
}

/// The bridge sends `"clientID": null` for messages outside a session.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
	Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Current UTC time in the bridge's timestamp format (`2024-05-01T12:00:00.000Z`).
pub fn now_timestamp() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
