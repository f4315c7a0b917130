use std::collections::HashMap;

use huddle_core::{ConnectionId, MemberName, RoomId, ServerMessage};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::registry::{RegistryCommand, Room, presence};
use crate::signaling::{ConnectionHandle, SignalKind, relay};

const NAME_TAKEN_MESSAGE: &str = "This username is already taken in this room.";

/// The (room, name) pair a connection currently holds. A connection has
/// at most one; taking it out of the map is what makes leave/disconnect
/// cleanup run exactly once.
#[derive(Debug)]
struct Association {
    room: RoomId,
    name: MemberName,
}

/// Process-wide session state. Runs as a single actor task: commands are
/// handled strictly one at a time, and every notification a command
/// produces is queued on the member outboxes before the next command is
/// looked at. That serialization is the whole concurrency story: the
/// name-uniqueness check-then-set is atomic and no other member ever
/// observes a half-applied operation.
pub struct SessionRegistry {
    rooms: HashMap<RoomId, Room>,
    associations: HashMap<ConnectionId, Association>,
    command_rx: mpsc::Receiver<RegistryCommand>,
}

impl SessionRegistry {
    pub fn new(command_rx: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            rooms: HashMap::new(),
            associations: HashMap::new(),
            command_rx,
        }
    }

    pub async fn run(mut self) {
        info!("Session registry started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }

        info!("Session registry stopped");
    }

    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Join { room, name, conn } => self.join(room, name, conn),
            RegistryCommand::Leave { conn } => self.leave(conn),
            RegistryCommand::Disconnect { conn } => self.disconnect(conn),
            RegistryCommand::JoinCall { room, name, conn } => self.join_call(room, name, conn),
            RegistryCommand::LeaveCall { room, name, conn } => self.leave_call(room, name, conn),
            RegistryCommand::RequestParticipants { room, conn } => {
                self.request_participants(room, conn)
            }
            RegistryCommand::Relay {
                room,
                conn,
                kind,
                sender,
                payload,
                receiver,
            } => self.relay(room, conn, kind, sender, payload, receiver),
            RegistryCommand::Broadcast {
                room,
                conn,
                message,
                exclude_sender,
            } => self.broadcast(room, conn, message, exclude_sender),
        }
    }

    fn join(&mut self, room_id: RoomId, name: MemberName, conn: ConnectionHandle) {
        // A connection moving to a new room leaves its old one first.
        if self.associations.contains_key(&conn.id) {
            self.release(conn.id);
        }

        let room = self.rooms.entry(room_id.clone()).or_default();

        if room.contains(&name) {
            info!("Join refused for '{}' in room '{}': name taken", name, room_id);
            conn.send(ServerMessage::NameTaken {
                message: NAME_TAKEN_MESSAGE.to_owned(),
            });
            return;
        }

        info!("'{}' joined room '{}'", name, room_id);
        room.insert_member(name.clone(), conn.clone());
        self.associations.insert(
            conn.id,
            Association {
                room: room_id,
                name,
            },
        );

        presence::broadcast_membership(room);
        presence::send_participant_snapshot(&conn, room);
    }

    fn leave(&mut self, conn: ConnectionId) {
        if !self.release(conn) {
            debug!("Leave from connection {} with no association", conn);
        }
    }

    fn disconnect(&mut self, conn: ConnectionId) {
        if self.release(conn) {
            info!("Connection {} disconnected", conn);
        }
    }

    /// Shared cleanup behind `Leave` and `Disconnect`: take the
    /// association, drop the member from both room sets, notify the
    /// remaining members, and evict the room once it is empty. Returns
    /// false when the connection held no association (already left),
    /// which makes a leave followed by a transport disconnect a no-op
    /// the second time around.
    fn release(&mut self, conn: ConnectionId) -> bool {
        let Some(assoc) = self.associations.remove(&conn) else {
            return false;
        };

        let empty = {
            let Some(room) = self.rooms.get_mut(&assoc.room) else {
                warn!(
                    "Association for {} pointed at missing room '{}'",
                    conn, assoc.room
                );
                return true;
            };

            room.remove_member(&assoc.name);
            if room.leave_call(&assoc.name) {
                presence::broadcast_call_left(room, &assoc.name);
            }
            presence::broadcast_membership(room);
            info!("'{}' left room '{}'", assoc.name, assoc.room);

            room.is_empty()
        };

        if empty {
            self.rooms.remove(&assoc.room);
            debug!("Evicted empty room '{}'", assoc.room);
        }

        true
    }

    fn join_call(&mut self, room_id: RoomId, name: MemberName, conn: ConnectionId) {
        if !self.validate_member(conn, &room_id, &name) {
            return;
        }
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };

        if room.join_call(&name) {
            info!("'{}' joined the call in room '{}'", name, room_id);
            presence::broadcast_call_joined(room, &name);
        } else {
            debug!("'{}' is already in the call in room '{}'", name, room_id);
        }
    }

    fn leave_call(&mut self, room_id: RoomId, name: MemberName, conn: ConnectionId) {
        if !self.validate_member(conn, &room_id, &name) {
            return;
        }
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };

        if room.leave_call(&name) {
            info!("'{}' left the call in room '{}'", name, room_id);
            presence::broadcast_call_left(room, &name);
        }
    }

    /// Read-only and answerable for any connection: a room that does not
    /// exist (never created, or evicted while the requester reconnected)
    /// simply has no participants.
    fn request_participants(&self, room_id: RoomId, conn: ConnectionHandle) {
        match self.rooms.get(&room_id) {
            Some(room) => presence::send_participant_snapshot(&conn, room),
            None => conn.send(ServerMessage::CurrentParticipants {
                participants: Vec::new(),
            }),
        }
    }

    fn relay(
        &self,
        room_id: RoomId,
        conn: ConnectionId,
        kind: SignalKind,
        sender: MemberName,
        payload: Value,
        receiver: Option<MemberName>,
    ) {
        if !self.validate_member(conn, &room_id, &sender) {
            return;
        }
        let Some(room) = self.rooms.get(&room_id) else {
            return;
        };

        relay::forward(room, conn, kind, sender, payload, receiver.as_ref());
    }

    fn broadcast(
        &self,
        room_id: RoomId,
        conn: ConnectionId,
        message: ServerMessage,
        exclude_sender: bool,
    ) {
        if !self.validate_room(conn, &room_id) {
            return;
        }
        let Some(room) = self.rooms.get(&room_id) else {
            return;
        };

        if exclude_sender {
            room.broadcast_except(conn, message);
        } else {
            room.broadcast(message);
        }
    }

    /// A mutating or relaying operation must come from the connection
    /// that actually holds the (room, name) it references; anything else
    /// is stale (the sender already left or never joined) and ignored.
    fn validate_member(&self, conn: ConnectionId, room: &RoomId, name: &MemberName) -> bool {
        match self.associations.get(&conn) {
            Some(assoc) if &assoc.room == room && &assoc.name == name => true,
            _ => {
                debug!("Ignoring stale operation from {} on room '{}'", conn, room);
                false
            }
        }
    }

    fn validate_room(&self, conn: ConnectionId, room: &RoomId) -> bool {
        match self.associations.get(&conn) {
            Some(assoc) if &assoc.room == room => true,
            _ => {
                debug!("Ignoring stale operation from {} on room '{}'", conn, room);
                false
            }
        }
    }
}
