use huddle_core::{ConnectionId, MemberName, ServerMessage};

use crate::signaling::ConnectionHandle;

/// One member of a room: the display name it joined under and the
/// connection that owns that name.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: MemberName,
    pub conn: ConnectionHandle,
}

/// Membership and call-participation state of one room. Mutated only by
/// the registry actor, so plain Vecs in join order are all that is
/// needed; rooms are small and the order is what clients render.
#[derive(Debug, Default)]
pub struct Room {
    members: Vec<Member>,
    call_participants: Vec<MemberName>,
}

impl Room {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &MemberName) -> bool {
        self.members.iter().any(|m| &m.name == name)
    }

    pub fn member(&self, name: &MemberName) -> Option<&Member> {
        self.members.iter().find(|m| &m.name == name)
    }

    /// Caller checks uniqueness first; a duplicate insert is a logic bug.
    pub fn insert_member(&mut self, name: MemberName, conn: ConnectionHandle) {
        debug_assert!(!self.contains(&name));
        self.members.push(Member { name, conn });
    }

    pub fn remove_member(&mut self, name: &MemberName) -> Option<Member> {
        let idx = self.members.iter().position(|m| &m.name == name)?;
        Some(self.members.remove(idx))
    }

    pub fn member_names(&self) -> Vec<MemberName> {
        self.members.iter().map(|m| m.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Adds `name` to the call. Returns false when it was already there.
    pub fn join_call(&mut self, name: &MemberName) -> bool {
        if self.call_participants.contains(name) {
            return false;
        }
        self.call_participants.push(name.clone());
        true
    }

    /// Removes `name` from the call. Returns false when it was not there.
    pub fn leave_call(&mut self, name: &MemberName) -> bool {
        let before = self.call_participants.len();
        self.call_participants.retain(|n| n != name);
        self.call_participants.len() != before
    }

    pub fn in_call(&self, name: &MemberName) -> bool {
        self.call_participants.contains(name)
    }

    pub fn call_participants(&self) -> &[MemberName] {
        &self.call_participants
    }

    /// Queue `msg` on every member's outbox.
    pub fn broadcast(&self, msg: ServerMessage) {
        for member in &self.members {
            member.conn.send(msg.clone());
        }
    }

    /// Queue `msg` on every member's outbox except the connection that
    /// produced it.
    pub fn broadcast_except(&self, except: ConnectionId, msg: ServerMessage) {
        for member in self.members.iter().filter(|m| m.conn.id != except) {
            member.conn.send(msg.clone());
        }
    }
}
