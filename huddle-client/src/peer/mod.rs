mod link;
mod rtc;
mod transport;

pub use link::{LinkState, PeerLinkHandle, RetryPolicy};
pub use rtc::{RtcLinkFactory, default_ice_servers};
pub use transport::{LinkEvent, MediaLink, MediaLinkFactory};

pub(crate) use link::wait_until;
