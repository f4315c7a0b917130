use thiserror::Error;
use tokio::sync::mpsc::error::SendError;

use crate::registry::RegistryCommand;

/// Failures surfaced by [`crate::RegistryHandle`]. The only way a command
/// can fail to enter the registry is the actor task being gone, which
/// happens during shutdown only.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("session registry is no longer running")]
    Closed,
}

impl From<SendError<RegistryCommand>> for RegistryError {
    fn from(_: SendError<RegistryCommand>) -> Self {
        Self::Closed
    }
}
