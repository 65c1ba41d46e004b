// bridge: client session manager for the game bridge
//
// Connects to the in-game bridge server over a WebSocket, performs the
// `Ready` handshake, queues outbound messages until the session is bound,
// and correlates replies with the requests that caused them.

pub mod config;
pub mod error;
pub mod events;
mod queue;
mod replies;
pub mod session;
pub mod transport;

pub use bridge_protocol as protocol;
pub use bridge_protocol::{Envelope, MessageType, Payload, Request};
pub use config::{BridgeOptions, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_REPLY_TIMEOUT, IdGenerator};
pub use error::{Error, Result};
pub use events::{BridgeEvent, Listener};
pub use session::{Bridge, ConnectionState};
pub use transport::{FakeConnection, FakeTransportFactory, ReadyState, Transport, TransportEvent, TransportFactory, TransportParts, WebSocketConnector};
