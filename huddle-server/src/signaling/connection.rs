use huddle_core::{ConnectionId, ServerMessage};
use tokio::sync::mpsc;
use tracing::debug;

/// Non-owning reference to one client connection: its transport identity
/// plus the outbox the socket task drains. Rooms hold clones of this; the
/// socket task owns the receiving end and does the actual I/O, so sending
/// here never blocks registry processing.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { id, tx }
    }

    /// Queue a message for this connection. A send to a connection whose
    /// socket task already exited is dropped; the disconnect cleanup for
    /// it is either queued or already done.
    pub fn send(&self, msg: ServerMessage) {
        if self.tx.send(msg).is_err() {
            debug!("Dropping message for closed connection {}", self.id);
        }
    }
}
