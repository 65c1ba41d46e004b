use std::time::Duration;

use bridge::{Bridge, BridgeOptions, Listener};
use tokio::sync::mpsc;
use tracing::debug;

use crate::cli::Cli;
use crate::error::{CliError, Result};
use crate::output::OutputFormat;

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct CommandContext {
	pub options: BridgeOptions,
	pub format: OutputFormat,
}

impl CommandContext {
	pub fn new(cli: &Cli) -> Self {
		let options = BridgeOptions::default()
			.host(cli.host.clone())
			.port(cli.port)
			.reply_timeout(Duration::from_millis(cli.timeout_ms));
		Self { options, format: cli.format }
	}

	pub fn bridge(&self) -> Bridge {
		Bridge::with_options(self.options.clone())
	}

	/// Connects and waits for the handshake, bounded by the reply timeout.
	pub async fn connect_ready(&self) -> Result<Bridge> {
		let bridge = self.bridge();
		let (tx, mut rx) = mpsc::unbounded_channel();
		let ready_tx = tx.clone();
		let connected = Listener::connected(move || {
			let _ = ready_tx.send(true);
		});
		let disconnected = Listener::disconnected(move |_| {
			let _ = tx.send(false);
		});
		bridge.on(connected.clone());
		bridge.on(disconnected.clone());

		bridge.connect()?;
		debug!(target = "bridge", url = %self.options.url(), "waiting for handshake");
		let outcome = tokio::time::timeout(self.options.reply_timeout, rx.recv()).await;

		bridge.off(&connected);
		bridge.off(&disconnected);
		match outcome {
			Ok(Some(true)) => Ok(bridge),
			Ok(_) => Err(CliError::Disconnected),
			Err(_) => {
				bridge.disconnect();
				Err(CliError::ConnectTimeout(self.options.reply_timeout))
			}
		}
	}
}
