use thiserror::Error;

/// Errors surfaced by the client API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The background dispatcher is gone, usually after `shutdown`.
    #[error("client is shut down")]
    Closed,

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Errors from a peer media link or its factory.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("peer transport error: {0}")]
    Transport(String),
}

/// Errors from the local audio capture device.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("audio device unavailable: {0}")]
    Device(String),
}
