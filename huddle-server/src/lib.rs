//! Session coordinator and signaling relay.
//!
//! Tracks which connection is in which room under what display name,
//! brokers voice-call participation, and forwards opaque negotiation
//! payloads between members. All room state lives in a single actor task;
//! the WebSocket layer only parses frames and queues commands.

pub mod config;
pub mod error;
pub mod registry;
pub mod signaling;

pub use config::ServerConfig;
pub use error::RegistryError;
pub use registry::{RegistryCommand, RegistryHandle, Room, SessionRegistry};
pub use signaling::{AppState, ConnectionHandle, SignalKind, app, ws_handler};
