use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use huddle_core::{IceCandidate, MemberName, SdpKind, SessionDescription};

use crate::call::CallEvent;
use crate::media::{AudioSink, LocalMedia};
use crate::peer::transport::{LinkEvent, MediaLink, MediaLinkFactory};
use crate::room::RoomEvent;
use crate::signaling::SignalOutlet;

/// Negotiation lifecycle of a link to one remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No negotiation in flight.
    Idle,
    /// Local offer sent, waiting for the matching answer.
    Offering,
    /// Remote offer being answered.
    Answering,
    /// Negotiation complete, media flowing or attempting to flow.
    Connected,
    /// Terminally closed. Every later input is dropped.
    Closed,
}

/// Re-attempt schedule for failed links: doubling delays up to a cap,
/// a bounded number of times.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before re-attempt number `attempt`, counted from 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay)
    }
}

enum LinkCommand {
    StartOffer,
    RemoteOffer(SessionDescription),
    RemoteAnswer(SessionDescription),
    RemoteCandidate(IceCandidate),
    Close,
}

/// Handle to the task that owns one peer link.
///
/// The task serializes everything that touches the link: negotiation
/// input relayed from the remote member, transport events from the
/// link itself, and the retry timer. Inputs that no longer match the
/// link's state are logged and dropped rather than surfaced as errors.
pub struct PeerLinkHandle {
    remote: MemberName,
    tx: mpsc::Sender<LinkCommand>,
    task: JoinHandle<()>,
}

impl PeerLinkHandle {
    pub fn spawn(
        remote: MemberName,
        factory: Arc<dyn MediaLinkFactory>,
        media: Arc<LocalMedia>,
        sink: Arc<dyn AudioSink>,
        outlet: Arc<dyn SignalOutlet>,
        events: mpsc::UnboundedSender<RoomEvent>,
        retry: RetryPolicy,
    ) -> Self {
        let (tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);
        let link = PeerLink {
            remote: remote.clone(),
            state: LinkState::Idle,
            attempts: 0,
            retry,
            retry_at: None,
            link: None,
            have_remote_description: false,
            pending_candidates: Vec::new(),
            command_rx,
            event_rx,
            event_tx,
            factory,
            media,
            sink,
            outlet,
            events,
        };
        let task = tokio::spawn(link.run());
        Self { remote, tx, task }
    }

    pub fn remote(&self) -> &MemberName {
        &self.remote
    }

    /// Open a fresh transport and send an offer, replacing any link
    /// already negotiated with this peer.
    pub async fn start_offer(&self) {
        self.send(LinkCommand::StartOffer).await;
    }

    pub async fn remote_offer(&self, offer: SessionDescription) {
        self.send(LinkCommand::RemoteOffer(offer)).await;
    }

    pub async fn remote_answer(&self, answer: SessionDescription) {
        self.send(LinkCommand::RemoteAnswer(answer)).await;
    }

    pub async fn remote_candidate(&self, candidate: IceCandidate) {
        self.send(LinkCommand::RemoteCandidate(candidate)).await;
    }

    /// Close the link, cancel any pending retry and wait for the task
    /// to release its transport.
    pub async fn close(self) {
        let _ = self.tx.send(LinkCommand::Close).await;
        let _ = self.task.await;
    }

    async fn send(&self, command: LinkCommand) {
        if self.tx.send(command).await.is_err() {
            debug!("Peer link task for {} is gone", self.remote);
        }
    }
}

struct PeerLink {
    remote: MemberName,
    state: LinkState,
    attempts: u32,
    retry: RetryPolicy,
    retry_at: Option<Instant>,
    link: Option<Box<dyn MediaLink>>,
    have_remote_description: bool,
    /// Remote candidates that arrived before the remote description.
    pending_candidates: Vec<IceCandidate>,
    command_rx: mpsc::Receiver<LinkCommand>,
    event_rx: mpsc::Receiver<LinkEvent>,
    /// Kept so the event channel outlives individual links. A closed
    /// link may trail a last event; the handlers tolerate it.
    event_tx: mpsc::Sender<LinkEvent>,
    factory: Arc<dyn MediaLinkFactory>,
    media: Arc<LocalMedia>,
    sink: Arc<dyn AudioSink>,
    outlet: Arc<dyn SignalOutlet>,
    events: mpsc::UnboundedSender<RoomEvent>,
}

impl PeerLink {
    async fn run(mut self) {
        debug!("Peer link task for {} started", self.remote);
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = self.event_rx.recv() => self.handle_event(event).await,
                _ = wait_until(self.retry_at) => self.retry().await,
            }
            if self.state == LinkState::Closed {
                break;
            }
        }
        self.drop_link().await;
        debug!("Peer link task for {} stopped", self.remote);
    }

    async fn handle_command(&mut self, command: LinkCommand) {
        match command {
            LinkCommand::StartOffer => self.start_offer().await,
            LinkCommand::RemoteOffer(offer) => self.accept_remote_offer(offer).await,
            LinkCommand::RemoteAnswer(answer) => self.apply_remote_answer(answer).await,
            LinkCommand::RemoteCandidate(candidate) => self.add_remote_candidate(candidate).await,
            LinkCommand::Close => self.close().await,
        }
    }

    async fn handle_event(&mut self, event: LinkEvent) {
        if self.state == LinkState::Closed {
            return;
        }
        match event {
            LinkEvent::Candidate(candidate) => {
                self.outlet.send_candidate(&self.remote, &candidate).await;
            }
            LinkEvent::Connected => {
                self.state = LinkState::Connected;
                self.attempts = 0;
                self.retry_at = None;
                info!("Media link to {} connected", self.remote);
                self.notify(CallEvent::PeerConnected {
                    name: self.remote.clone(),
                });
            }
            LinkEvent::Failed => {
                warn!("Media link to {} failed", self.remote);
                self.fail().await;
            }
            LinkEvent::Disconnected => {
                debug!(
                    "Media link to {} lost connectivity, waiting for recovery",
                    self.remote
                );
            }
        }
    }

    async fn start_offer(&mut self) {
        if self.state == LinkState::Closed {
            return;
        }
        self.drop_link().await;
        let Some(link) = self.open_link().await else {
            return;
        };
        // Stored before negotiating so a failed offer is closed by
        // fail() instead of leaking the open transport.
        let link = self.link.insert(link);
        match link.create_offer().await {
            Ok(offer) => {
                self.state = LinkState::Offering;
                debug!("Offering to {}", self.remote);
                self.outlet.send_offer(&self.remote, &offer).await;
            }
            Err(e) => {
                warn!("Failed to create offer for {}: {}", self.remote, e);
                self.fail().await;
            }
        }
    }

    async fn accept_remote_offer(&mut self, offer: SessionDescription) {
        if self.state == LinkState::Closed {
            debug!("Dropping offer for closed link to {}", self.remote);
            return;
        }
        if offer.kind != SdpKind::Offer {
            warn!("Dropping mislabeled offer from {}", self.remote);
            return;
        }
        // A fresh remote offer supersedes whatever was negotiated or in
        // flight with this peer.
        self.drop_link().await;
        let Some(link) = self.open_link().await else {
            return;
        };
        self.state = LinkState::Answering;
        // Stored first so a failed answer closes the transport too.
        let link = self.link.insert(link);
        match link.accept_offer(offer).await {
            Ok(answer) => {
                self.have_remote_description = true;
                self.flush_candidates().await;
                self.state = LinkState::Connected;
                debug!("Answered offer from {}", self.remote);
                self.outlet.send_answer(&self.remote, &answer).await;
            }
            Err(e) => {
                warn!("Failed to answer offer from {}: {}", self.remote, e);
                self.fail().await;
            }
        }
    }

    async fn apply_remote_answer(&mut self, answer: SessionDescription) {
        if self.state != LinkState::Offering {
            debug!(
                "Dropping answer from {} in state {:?}",
                self.remote, self.state
            );
            return;
        }
        if answer.kind != SdpKind::Answer {
            warn!("Dropping mislabeled answer from {}", self.remote);
            return;
        }
        let applied = match &self.link {
            Some(link) => link.apply_answer(answer).await,
            None => return,
        };
        match applied {
            Ok(()) => {
                self.have_remote_description = true;
                self.flush_candidates().await;
                self.state = LinkState::Connected;
                debug!("Answer from {} applied", self.remote);
            }
            Err(e) => {
                warn!("Failed to apply answer from {}: {}", self.remote, e);
                self.fail().await;
            }
        }
    }

    async fn add_remote_candidate(&mut self, candidate: IceCandidate) {
        if self.state == LinkState::Closed {
            return;
        }
        let Some(link) = &self.link else {
            debug!("Dropping candidate from {} with no link open", self.remote);
            return;
        };
        if !self.have_remote_description {
            self.pending_candidates.push(candidate);
            return;
        }
        if let Err(e) = link.add_remote_candidate(candidate).await {
            warn!("Failed to apply candidate from {}: {}", self.remote, e);
        }
    }

    async fn retry(&mut self) {
        self.retry_at = None;
        if self.state != LinkState::Idle {
            return;
        }
        info!("Re-offering to {}", self.remote);
        self.start_offer().await;
    }

    /// Tear down the current transport and either schedule a re-attempt
    /// or give up once the budget is spent.
    async fn fail(&mut self) {
        self.drop_link().await;
        self.attempts += 1;
        if self.attempts > self.retry.max_attempts {
            warn!(
                "Giving up on {} after {} re-attempts",
                self.remote, self.retry.max_attempts
            );
            self.notify(CallEvent::PeerUnreachable {
                name: self.remote.clone(),
            });
            self.state = LinkState::Closed;
            return;
        }
        let delay = self.retry.delay(self.attempts);
        info!(
            "Link to {} failed, retrying in {:?} (attempt {} of {})",
            self.remote, delay, self.attempts, self.retry.max_attempts
        );
        self.state = LinkState::Idle;
        self.retry_at = Some(Instant::now() + delay);
    }

    async fn close(&mut self) {
        self.drop_link().await;
        self.retry_at = None;
        self.state = LinkState::Closed;
        debug!("Link to {} closed", self.remote);
    }

    async fn open_link(&mut self) -> Option<Box<dyn MediaLink>> {
        let opened = self
            .factory
            .open(
                self.remote.clone(),
                Arc::clone(&self.media),
                Arc::clone(&self.sink),
                self.event_tx.clone(),
            )
            .await;
        match opened {
            Ok(link) => Some(link),
            Err(e) => {
                warn!("Failed to open link to {}: {}", self.remote, e);
                self.fail().await;
                None
            }
        }
    }

    async fn drop_link(&mut self) {
        self.have_remote_description = false;
        self.pending_candidates.clear();
        if let Some(link) = self.link.take() {
            if let Err(e) = link.close().await {
                debug!("Error closing link to {}: {}", self.remote, e);
            }
        }
    }

    async fn flush_candidates(&mut self) {
        let Some(link) = &self.link else {
            return;
        };
        for candidate in self.pending_candidates.drain(..) {
            if let Err(e) = link.add_remote_candidate(candidate).await {
                warn!(
                    "Failed to apply buffered candidate from {}: {}",
                    self.remote, e
                );
            }
        }
    }

    fn notify(&self, event: CallEvent) {
        let _ = self.events.send(RoomEvent::Call(event));
    }
}

pub(crate) async fn wait_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
