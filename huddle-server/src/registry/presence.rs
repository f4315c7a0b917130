//! Derives presence views from room state and pushes them out. Called by
//! the registry actor after every mutation; keeping the wire shapes here
//! keeps the actor about state transitions only.

use huddle_core::{MemberName, ServerMessage};

use crate::registry::Room;
use crate::signaling::ConnectionHandle;

/// Full member-name list to everyone in the room, joiner included.
pub fn broadcast_membership(room: &Room) {
    room.broadcast(ServerMessage::MembershipUpdate {
        names: room.member_names(),
    });
}

/// Call join/leave go to the whole room, the affected member included, so
/// each client tracks call state through one code path.
pub fn broadcast_call_joined(room: &Room, name: &MemberName) {
    room.broadcast(ServerMessage::CallParticipantJoined { name: name.clone() });
}

pub fn broadcast_call_left(room: &Room, name: &MemberName) {
    room.broadcast(ServerMessage::CallParticipantLeft { name: name.clone() });
}

/// Point-to-point call snapshot for one connection; lets a joiner render
/// existing call state without joining the call, and a reconnecting
/// client resynchronize.
pub fn send_participant_snapshot(conn: &ConnectionHandle, room: &Room) {
    conn.send(ServerMessage::CurrentParticipants {
        participants: room.call_participants().to_vec(),
    });
}
