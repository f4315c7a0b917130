mod client;
mod outlet;

pub use client::{SignalSender, SignalingClient, SignalingConfig, SignalingEvent};
pub use outlet::{RelayOutlet, SignalOutlet};
