use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use huddle_core::{IceCandidate, IceServerConfig, MemberName, SessionDescription};

use crate::error::LinkError;
use crate::media::{AudioSink, LocalMedia};

/// Events a media link pushes back into its owning peer link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A local trickle candidate is ready to send to the remote peer.
    Candidate(IceCandidate),
    /// Connectivity reached the connected state.
    Connected,
    /// Connectivity failed and the link is unusable.
    Failed,
    /// Transient connectivity loss; the transport may still recover.
    Disconnected,
}

/// One negotiable media transport to a single remote peer.
///
/// The production implementation wraps a WebRTC peer connection; tests
/// substitute scripted links. Descriptions and candidates are already
/// validated by the caller, which also guarantees call order: exactly one
/// of `create_offer` or `accept_offer` first, candidates only after a
/// remote description is in place.
#[async_trait]
pub trait MediaLink: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, LinkError>;

    /// Apply a remote offer and produce the local answer.
    async fn accept_offer(
        &self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, LinkError>;

    async fn apply_answer(&self, answer: SessionDescription) -> Result<(), LinkError>;

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), LinkError>;

    async fn close(&self) -> Result<(), LinkError>;
}

/// Opens media links. One factory serves every peer in a call.
#[async_trait]
pub trait MediaLinkFactory: Send + Sync {
    /// Replace the ICE server set used for links opened from now on.
    /// Links already open keep their configuration.
    async fn configure_ice(&self, _servers: Vec<IceServerConfig>) {}

    /// Open a fresh link to `remote` with the local track attached.
    /// Transport events flow back through `events`; inbound audio goes
    /// to `sink`.
    async fn open(
        &self,
        remote: MemberName,
        media: Arc<LocalMedia>,
        sink: Arc<dyn AudioSink>,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Box<dyn MediaLink>, LinkError>;
}
