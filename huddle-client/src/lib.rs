//! Client side of a huddle deployment: the coordinator connection with
//! automatic re-join, the room event stream, and the per-peer media
//! links for the room's audio call.

pub mod call;
pub mod error;
pub mod media;
pub mod peer;
pub mod room;
pub mod signaling;

pub use call::{CallEvent, CallSession, MediaStack};
pub use error::{CaptureError, ClientError, LinkError};
pub use media::{AudioCapture, AudioFrame, AudioSink, DiscardSink, LocalMedia, SilenceCapture};
pub use peer::{
    LinkEvent, LinkState, MediaLink, MediaLinkFactory, PeerLinkHandle, RetryPolicy, RtcLinkFactory,
};
pub use room::{RoomClient, RoomClientConfig, RoomEvent};
pub use signaling::{
    RelayOutlet, SignalOutlet, SignalSender, SignalingClient, SignalingConfig, SignalingEvent,
};
