use huddle_core::{ConnectionId, MemberName, RoomId, ServerMessage};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::RegistryError;
use crate::registry::{RegistryCommand, SessionRegistry};
use crate::signaling::{ConnectionHandle, SignalKind};

const COMMAND_BUFFER: usize = 256;

/// Cloneable front door of the registry actor. Every call queues one
/// command; ordering between calls from one task is preserved by the
/// channel, and the actor does the rest.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create the registry and start its actor task.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let registry = SessionRegistry::new(rx);
        tokio::spawn(registry.run());
        Self { tx }
    }

    pub async fn join(
        &self,
        room: RoomId,
        name: MemberName,
        conn: ConnectionHandle,
    ) -> Result<(), RegistryError> {
        Ok(self
            .tx
            .send(RegistryCommand::Join { room, name, conn })
            .await?)
    }

    pub async fn leave(&self, conn: ConnectionId) -> Result<(), RegistryError> {
        Ok(self.tx.send(RegistryCommand::Leave { conn }).await?)
    }

    pub async fn disconnect(&self, conn: ConnectionId) -> Result<(), RegistryError> {
        Ok(self.tx.send(RegistryCommand::Disconnect { conn }).await?)
    }

    pub async fn join_call(
        &self,
        room: RoomId,
        name: MemberName,
        conn: ConnectionId,
    ) -> Result<(), RegistryError> {
        Ok(self
            .tx
            .send(RegistryCommand::JoinCall { room, name, conn })
            .await?)
    }

    pub async fn leave_call(
        &self,
        room: RoomId,
        name: MemberName,
        conn: ConnectionId,
    ) -> Result<(), RegistryError> {
        Ok(self
            .tx
            .send(RegistryCommand::LeaveCall { room, name, conn })
            .await?)
    }

    pub async fn request_participants(
        &self,
        room: RoomId,
        conn: ConnectionHandle,
    ) -> Result<(), RegistryError> {
        Ok(self
            .tx
            .send(RegistryCommand::RequestParticipants { room, conn })
            .await?)
    }

    pub async fn relay(
        &self,
        room: RoomId,
        conn: ConnectionId,
        kind: SignalKind,
        sender: MemberName,
        payload: Value,
        receiver: Option<MemberName>,
    ) -> Result<(), RegistryError> {
        Ok(self
            .tx
            .send(RegistryCommand::Relay {
                room,
                conn,
                kind,
                sender,
                payload,
                receiver,
            })
            .await?)
    }

    pub async fn broadcast(
        &self,
        room: RoomId,
        conn: ConnectionId,
        message: ServerMessage,
        exclude_sender: bool,
    ) -> Result<(), RegistryError> {
        Ok(self
            .tx
            .send(RegistryCommand::Broadcast {
                room,
                conn,
                message,
                exclude_sender,
            })
            .await?)
    }
}
