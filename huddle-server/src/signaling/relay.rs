use huddle_core::{ConnectionId, MemberName, ServerMessage};
use serde_json::Value;
use tracing::debug;

use crate::registry::Room;

/// Which negotiation event a relayed payload rides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Forward an opaque negotiation payload. With a receiver the message
/// goes to that member alone; a receiver that already left the room is
/// dropped without telling the sender (signaling is best effort, the
/// sender finds out through presence). With no receiver the payload fans
/// out to every member except the sending connection.
pub fn forward(
    room: &Room,
    sender_conn: ConnectionId,
    kind: SignalKind,
    sender: MemberName,
    payload: Value,
    receiver: Option<&MemberName>,
) {
    let msg = match kind {
        SignalKind::Offer => ServerMessage::Offer { payload, sender },
        SignalKind::Answer => ServerMessage::Answer { payload, sender },
        SignalKind::IceCandidate => ServerMessage::IceCandidate { payload, sender },
    };

    match receiver {
        Some(receiver) => match room.member(receiver) {
            Some(member) => member.conn.send(msg),
            None => debug!("Dropping {:?} signal for absent member {}", kind, receiver),
        },
        None => room.broadcast_except(sender_conn, msg),
    }
}
