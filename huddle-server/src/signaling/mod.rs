mod connection;
pub mod relay;
mod ws_handler;

pub use connection::*;
pub use relay::SignalKind;
pub use ws_handler::*;
