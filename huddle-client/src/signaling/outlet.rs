use async_trait::async_trait;
use tracing::error;

use huddle_core::{ClientMessage, IceCandidate, MemberName, RoomId, SessionDescription};

use crate::signaling::SignalSender;

/// Where negotiation signals for remote peers go.
///
/// Sends are fire and forget: a signal that cannot be delivered is the
/// same as one lost in transit, and the link retry path covers both.
#[async_trait]
pub trait SignalOutlet: Send + Sync {
    async fn send_offer(&self, to: &MemberName, offer: &SessionDescription);

    async fn send_answer(&self, to: &MemberName, answer: &SessionDescription);

    async fn send_candidate(&self, to: &MemberName, candidate: &IceCandidate);
}

/// Routes signals point to point through the coordinator's negotiation
/// relay, stamped with the local member identity.
pub struct RelayOutlet {
    room: RoomId,
    local: MemberName,
    sender: SignalSender,
}

impl RelayOutlet {
    pub fn new(room: RoomId, local: MemberName, sender: SignalSender) -> Self {
        Self {
            room,
            local,
            sender,
        }
    }
}

#[async_trait]
impl SignalOutlet for RelayOutlet {
    async fn send_offer(&self, to: &MemberName, offer: &SessionDescription) {
        match serde_json::to_value(offer) {
            Ok(payload) => {
                let _ = self.sender.send(ClientMessage::Offer {
                    room: self.room.clone(),
                    payload,
                    sender: self.local.clone(),
                    receiver: Some(to.clone()),
                });
            }
            Err(e) => error!("Failed to serialize offer for {}: {}", to, e),
        }
    }

    async fn send_answer(&self, to: &MemberName, answer: &SessionDescription) {
        match serde_json::to_value(answer) {
            Ok(payload) => {
                let _ = self.sender.send(ClientMessage::Answer {
                    room: self.room.clone(),
                    payload,
                    sender: self.local.clone(),
                    receiver: Some(to.clone()),
                });
            }
            Err(e) => error!("Failed to serialize answer for {}: {}", to, e),
        }
    }

    async fn send_candidate(&self, to: &MemberName, candidate: &IceCandidate) {
        match serde_json::to_value(candidate) {
            Ok(payload) => {
                let _ = self.sender.send(ClientMessage::IceCandidate {
                    room: self.room.clone(),
                    payload,
                    sender: self.local.clone(),
                    receiver: Some(to.clone()),
                });
            }
            Err(e) => error!("Failed to serialize candidate for {}: {}", to, e),
        }
    }
}
