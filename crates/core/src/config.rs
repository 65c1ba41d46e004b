//! Connection settings and injectable collaborators.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::{TransportFactory, WebSocketConnector};

/// Port the game bridge listens on.
pub const DEFAULT_PORT: u16 = 8787;

/// The bridge only accepts local connections.
pub const DEFAULT_HOST: &str = "localhost";

/// How long `send_and_wait_for_reply` waits when no timeout is given.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

pub const HOST_ENV: &str = "BRIDGE_HOST";
pub const PORT_ENV: &str = "BRIDGE_PORT";
pub const TIMEOUT_ENV: &str = "BRIDGE_TIMEOUT_MS";

/// Produces globally unique ids for outbound messages.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Settings for a [`Bridge`](crate::Bridge).
///
/// ```ignore
/// let options = BridgeOptions::default()
///     .port(9000)
///     .reply_timeout(Duration::from_secs(2))
///     .id_generator(|| next_id());
/// let bridge = Bridge::with_options(options);
/// ```
#[derive(Clone)]
pub struct BridgeOptions {
	pub host: String,
	pub port: u16,
	pub reply_timeout: Duration,
	pub(crate) transport_factory: Arc<dyn TransportFactory>,
	pub(crate) id_generator: IdGenerator,
}

impl Default for BridgeOptions {
	fn default() -> Self {
		Self {
			host: DEFAULT_HOST.to_string(),
			port: DEFAULT_PORT,
			reply_timeout: DEFAULT_REPLY_TIMEOUT,
			transport_factory: Arc::new(WebSocketConnector),
			id_generator: Arc::new(|| uuid::Uuid::new_v4().to_string()),
		}
	}
}

impl fmt::Debug for BridgeOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BridgeOptions")
			.field("host", &self.host)
			.field("port", &self.port)
			.field("reply_timeout", &self.reply_timeout)
			.finish_non_exhaustive()
	}
}

impl BridgeOptions {
	/// Defaults overridden by `BRIDGE_HOST`, `BRIDGE_PORT` and `BRIDGE_TIMEOUT_MS`.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let mut options = Self::default();
		if let Some(host) = lookup(HOST_ENV).filter(|h| !h.trim().is_empty()) {
			options.host = host.trim().to_string();
		}
		if let Some(port) = lookup(PORT_ENV) {
			options.port = port
				.trim()
				.parse()
				.map_err(|_| Error::Config(format!("{PORT_ENV} must be a port number, got {port:?}")))?;
		}
		if let Some(timeout) = lookup(TIMEOUT_ENV) {
			let millis: u64 = timeout
				.trim()
				.parse()
				.map_err(|_| Error::Config(format!("{TIMEOUT_ENV} must be milliseconds, got {timeout:?}")))?;
			options.reply_timeout = Duration::from_millis(millis);
		}
		Ok(options)
	}

	pub fn host(mut self, host: impl Into<String>) -> Self {
		self.host = host.into();
		self
	}

	pub fn port(mut self, port: u16) -> Self {
		self.port = port;
		self
	}

	pub fn reply_timeout(mut self, timeout: Duration) -> Self {
		self.reply_timeout = timeout;
		self
	}

	/// Replaces the socket implementation, e.g. with a fake transport in tests.
	pub fn transport_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
		self.transport_factory = Arc::new(factory);
		self
	}

	/// Replaces the message id generator (UUID v4 by default).
	pub fn id_generator(mut self, generator: impl Fn() -> String + Send + Sync + 'static) -> Self {
		self.id_generator = Arc::new(generator);
		self
	}

	/// WebSocket URL of the bridge.
	pub fn url(&self) -> String {
		format!("ws://{}:{}", self.host, self.port)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		move |key| vars.get(key).cloned()
	}

	#[test]
	fn defaults_target_local_bridge_port() {
		let options = BridgeOptions::default();
		assert_eq!(options.url(), "ws://localhost:8787");
		assert_eq!(options.reply_timeout, Duration::from_secs(10));
	}

	#[test]
	fn environment_overrides_defaults() {
		let options = BridgeOptions::from_lookup(lookup(&[(HOST_ENV, "127.0.0.1"), (PORT_ENV, " 9001 "), (TIMEOUT_ENV, "250")])).unwrap();
		assert_eq!(options.url(), "ws://127.0.0.1:9001");
		assert_eq!(options.reply_timeout, Duration::from_millis(250));
	}

	#[test]
	fn invalid_port_is_a_config_error() {
		let err = BridgeOptions::from_lookup(lookup(&[(PORT_ENV, "eighty")])).unwrap_err();
		assert!(matches!(err, Error::Config(msg) if msg.contains(PORT_ENV)));
	}

	#[test]
	fn id_generator_is_replaceable() {
		let options = BridgeOptions::default().id_generator(|| "fixed".to_string());
		assert_eq!((options.id_generator)(), "fixed");
		assert_ne!((BridgeOptions::default().id_generator)(), (BridgeOptions::default().id_generator)());
	}
}
