mod member;
mod message;
mod room;
mod signal;

pub use member::{ConnectionId, MemberName};
pub use message::{ClientMessage, ServerMessage, Stroke};
pub use room::RoomId;
pub use signal::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
