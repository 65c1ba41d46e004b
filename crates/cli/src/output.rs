//! Command results printed to stdout.

use std::time::Instant;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::CliError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// One JSON document per line
	Json,
	/// Indented JSON
	#[default]
	Pretty,
}

/// Outcome of one command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	Timeout,
	ConnectionClosed,
	RemoteError,
	ProtocolError,
	InvalidInput,
	InternalError,
}

impl From<&CliError> for CommandError {
	fn from(err: &CliError) -> Self {
		let code = match err {
			CliError::Bridge(bridge::Error::Timeout) | CliError::ConnectTimeout(_) => ErrorCode::Timeout,
			CliError::Bridge(bridge::Error::ConnectionClosed) | CliError::Disconnected => ErrorCode::ConnectionClosed,
			CliError::Bridge(bridge::Error::Remote(_)) => ErrorCode::RemoteError,
			CliError::Bridge(e) if e.is_protocol_violation() => ErrorCode::ProtocolError,
			CliError::Bridge(bridge::Error::Decode(_)) => ErrorCode::ProtocolError,
			CliError::Bridge(bridge::Error::InvalidPayload { .. }) | CliError::InvalidPayload(_) => ErrorCode::InvalidInput,
			_ => ErrorCode::InternalError,
		};
		Self { code, message: err.to_string() }
	}
}

/// Times a command and builds its result.
pub struct ResultBuilder {
	command: String,
	start: Instant,
}

impl ResultBuilder {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			start: Instant::now(),
		}
	}

	pub fn finish<T: Serialize>(self, outcome: &Result<T, CliError>) -> CommandResult<&T> {
		let (data, error) = match outcome {
			Ok(data) => (Some(data), None),
			Err(err) => (None, Some(CommandError::from(err))),
		};
		CommandResult {
			ok: error.is_none(),
			command: self.command,
			data,
			error,
			duration_ms: Some(self.start.elapsed().as_millis() as u64),
		}
	}
}

pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	print_json(result, format);
}

/// Prints any serializable value in `format`.
pub fn print_json<T: Serialize + ?Sized>(value: &T, format: OutputFormat) {
	let rendered = match format {
		OutputFormat::Json => serde_json::to_string(value),
		OutputFormat::Pretty => serde_json::to_string_pretty(value),
	};
	if let Ok(json) = rendered {
		println!("{json}");
	}
}
