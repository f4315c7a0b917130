//! Shared protocol and model types for the huddle coordinator and clients.

mod model;

pub use model::{
    ClientMessage, ConnectionId, IceCandidate, IceServerConfig, MemberName, RoomId, SdpKind,
    ServerMessage, SessionDescription, Stroke,
};
