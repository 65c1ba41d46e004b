use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Bridge(#[from] bridge::Error),

	#[error("Invalid --payload JSON: {0}")]
	InvalidPayload(#[source] serde_json::Error),

	#[error("Bridge did not become ready within {0:?}")]
	ConnectTimeout(Duration),

	#[error("Bridge disconnected before the handshake")]
	Disconnected,

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
