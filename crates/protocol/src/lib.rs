//! Wire types for the game bridge protocol.
//!
//! This crate contains the serde-serializable types exchanged with the game
//! bridge over its WebSocket control interface. These types represent the
//! "protocol layer" - the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * 1:1 with protocol: Field names match the bridge's JSON exactly
//! * Stable: Changes only when the wire protocol changes
//!
//! Connection handling, handshakes, and reply correlation are built on top of
//! these types in `bridge-rs`.

pub mod data;
pub mod envelope;
pub mod message;

pub use data::*;
pub use envelope::*;
pub use message::*;
