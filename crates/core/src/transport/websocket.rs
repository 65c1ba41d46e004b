//! WebSocket transport built on `tokio-tungstenite`.
//!
//! Each transport owns one background task holding the socket. The task
//! reports frames and lifecycle changes through the event channel and writes
//! whatever the handle queues on the outgoing channel.

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::{ReadyState, ReadyStateCell, Transport, TransportEvent, TransportFactory, TransportParts};
use crate::error::{Error, Result};

/// Close code reported when the socket dropped without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported when the peer's close frame had no status.
const NO_STATUS_RECEIVED: u16 = 1005;
const NORMAL_CLOSURE: u16 = 1000;

/// Default transport factory: dials the bridge with `tokio-tungstenite`.
///
/// The socket task runs on the tokio runtime current at [`open`] time.
///
/// [`open`]: TransportFactory::open
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl TransportFactory for WebSocketConnector {
	fn open(&self, url: &str) -> Result<TransportParts> {
		let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
		let state = ReadyStateCell::new(ReadyState::Connecting);
		let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
		let (event_tx, event_rx) = mpsc::unbounded_channel();

		runtime.spawn(run_socket(url.to_string(), state.clone(), outgoing_rx, event_tx));

		Ok(TransportParts {
			transport: Box::new(WebSocketTransport { state, outgoing: outgoing_tx }),
			events: event_rx,
		})
	}
}

#[derive(Debug)]
enum Outgoing {
	Text(String),
	Close,
}

struct WebSocketTransport {
	state: ReadyStateCell,
	outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl Transport for WebSocketTransport {
	fn ready_state(&self) -> ReadyState {
		self.state.get()
	}

	fn send(&self, text: String) -> Result<()> {
		let state = self.state.get();
		if state != ReadyState::Open {
			return Err(Error::Transport(format!("cannot send while socket is {state:?}")));
		}
		self.outgoing
			.send(Outgoing::Text(text))
			.map_err(|_| Error::Transport("socket task has exited".to_string()))
	}

	fn close(&self) {
		if matches!(self.state.get(), ReadyState::Closing | ReadyState::Closed) {
			return;
		}
		self.state.set(ReadyState::Closing);
		let _ = self.outgoing.send(Outgoing::Close);
	}
}

async fn run_socket(url: String, state: ReadyStateCell, mut outgoing: mpsc::UnboundedReceiver<Outgoing>, events: mpsc::UnboundedSender<TransportEvent>) {
	let emit = |event: TransportEvent| {
		let _ = events.send(event);
	};
	let finish = |code: u16, reason: String| {
		state.set(ReadyState::Closed);
		let _ = events.send(TransportEvent::Close { code, reason });
	};

	// Anything on the outgoing channel before the socket opens is a close request.
	let socket = tokio::select! {
		result = tokio_tungstenite::connect_async(url.as_str()) => match result {
			Ok((socket, _response)) => socket,
			Err(err) => {
				warn!(target = "bridge.transport", %url, error = %err, "websocket connect failed");
				emit(TransportEvent::Error(err.to_string()));
				finish(ABNORMAL_CLOSURE, err.to_string());
				return;
			}
		},
		_ = outgoing.recv() => {
			debug!(target = "bridge.transport", %url, "closed before the socket opened");
			finish(NORMAL_CLOSURE, "closed before open".to_string());
			return;
		}
	};

	state.set(ReadyState::Open);
	emit(TransportEvent::Open);
	debug!(target = "bridge.transport", %url, "websocket open");

	let (mut sink, mut stream) = socket.split();
	loop {
		tokio::select! {
			frame = stream.next() => match frame {
				Some(Ok(Message::Text(text))) => emit(TransportEvent::Text(text)),
				Some(Ok(Message::Binary(data))) => emit(TransportEvent::Binary(data)),
				Some(Ok(Message::Close(frame))) => {
					let (code, reason) = frame
						.map(|f| (u16::from(f.code), f.reason.into_owned()))
						.unwrap_or((NO_STATUS_RECEIVED, String::new()));
					let _ = sink.flush().await;
					finish(code, reason);
					return;
				}
				// tungstenite queues pong replies itself
				Some(Ok(_)) => {}
				Some(Err(err)) => {
					emit(TransportEvent::Error(err.to_string()));
					finish(ABNORMAL_CLOSURE, err.to_string());
					return;
				}
				None => {
					finish(ABNORMAL_CLOSURE, "stream ended".to_string());
					return;
				}
			},
			command = outgoing.recv() => match command {
				Some(Outgoing::Text(text)) => {
					if let Err(err) = sink.send(Message::Text(text)).await {
						emit(TransportEvent::Error(format!("websocket send failed: {err}")));
						finish(ABNORMAL_CLOSURE, err.to_string());
						return;
					}
				}
				Some(Outgoing::Close) | None => {
					let _ = sink.close().await;
					finish(NORMAL_CLOSURE, "closed by client".to_string());
					return;
				}
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn open_without_runtime_is_reported() {
		let err = WebSocketConnector.open("ws://localhost:8787").unwrap_err();
		assert!(matches!(err, Error::NoRuntime));
	}

	#[tokio::test]
	async fn refused_connection_reports_error_then_close() {
		let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		drop(listener);

		let mut parts = WebSocketConnector.open(&format!("ws://127.0.0.1:{port}")).unwrap();
		assert_eq!(parts.transport.ready_state(), ReadyState::Connecting);
		assert!(parts.transport.send("early".to_string()).is_err());

		assert!(matches!(parts.events.recv().await, Some(TransportEvent::Error(_))));
		assert!(matches!(parts.events.recv().await, Some(TransportEvent::Close { code: ABNORMAL_CLOSURE, .. })));
		assert_eq!(parts.transport.ready_state(), ReadyState::Closed);
	}
}
