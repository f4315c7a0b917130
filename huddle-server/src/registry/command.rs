use huddle_core::{ConnectionId, MemberName, RoomId, ServerMessage};
use serde_json::Value;

use crate::signaling::{ConnectionHandle, SignalKind};

/// Commands entering the registry actor. One queue for the whole process;
/// the actor drains it strictly in order, so every check-then-set here is
/// atomic without locks.
#[derive(Debug)]
pub enum RegistryCommand {
    /// A connection wants to join `room` as `name`. Moves the connection
    /// out of its previous room first, if it had one.
    Join {
        room: RoomId,
        name: MemberName,
        conn: ConnectionHandle,
    },

    /// Explicit leave; the room and name come from the connection's
    /// current association.
    Leave { conn: ConnectionId },

    /// Transport-level disconnect. Same cleanup as `Leave`; safe to queue
    /// more than once for the same connection.
    Disconnect { conn: ConnectionId },

    /// `name` enters the voice call of `room`.
    JoinCall {
        room: RoomId,
        name: MemberName,
        conn: ConnectionId,
    },

    /// `name` leaves the voice call of `room`.
    LeaveCall {
        room: RoomId,
        name: MemberName,
        conn: ConnectionId,
    },

    /// Point-to-point snapshot of the current call participants, sent to
    /// the requesting connection only.
    RequestParticipants { room: RoomId, conn: ConnectionHandle },

    /// Forward an opaque negotiation payload to one member, or to the
    /// whole room except the sender when no receiver is named.
    Relay {
        room: RoomId,
        conn: ConnectionId,
        kind: SignalKind,
        sender: MemberName,
        payload: Value,
        receiver: Option<MemberName>,
    },

    /// Fan an already-built message out to the room, optionally skipping
    /// the producing connection. Carries the content events; the registry
    /// does not look inside.
    Broadcast {
        room: RoomId,
        conn: ConnectionId,
        message: ServerMessage,
        exclude_sender: bool,
    },
}
