use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use huddle_core::{ClientMessage, IceCandidate, MemberName, RoomId, SessionDescription};

use crate::call::event::CallEvent;
use crate::error::CaptureError;
use crate::media::{AudioCapture, AudioSink, DiscardSink, LocalMedia, SilenceCapture};
use crate::peer::{MediaLinkFactory, PeerLinkHandle, RetryPolicy, RtcLinkFactory};
use crate::room::RoomEvent;
use crate::signaling::{SignalOutlet, SignalSender};

/// The pluggable media pieces of a call: where outbound audio comes
/// from, where inbound audio goes, and how peer links are opened.
pub struct MediaStack {
    pub capture: Arc<dyn AudioCapture>,
    pub sink: Arc<dyn AudioSink>,
    pub factory: Arc<dyn MediaLinkFactory>,
}

impl Default for MediaStack {
    /// Silence out, discard in, WebRTC links. Applications with real
    /// audio hardware replace capture and sink.
    fn default() -> Self {
        Self {
            capture: Arc::new(SilenceCapture),
            sink: Arc::new(DiscardSink),
            factory: Arc::new(RtcLinkFactory::new()),
        }
    }
}

/// Drives the local side of the room's audio call.
///
/// Owns one peer link per remote participant and the shared local
/// media. The choreography is fixed: members already in the call offer
/// to each newcomer, so joining itself sends nothing but the join
/// announcement. Capture is opened before that announcement goes out;
/// a denied microphone aborts the join entirely.
pub struct CallSession {
    room: RoomId,
    local: MemberName,
    in_call: bool,
    muted: bool,
    /// Remote members currently in the call, join order.
    participants: Vec<MemberName>,
    links: HashMap<MemberName, PeerLinkHandle>,
    media: Option<Arc<LocalMedia>>,
    capture: Arc<dyn AudioCapture>,
    sink: Arc<dyn AudioSink>,
    factory: Arc<dyn MediaLinkFactory>,
    outlet: Arc<dyn SignalOutlet>,
    sender: SignalSender,
    events: mpsc::UnboundedSender<RoomEvent>,
    retry: RetryPolicy,
}

impl CallSession {
    pub fn new(
        room: RoomId,
        local: MemberName,
        sender: SignalSender,
        outlet: Arc<dyn SignalOutlet>,
        stack: MediaStack,
        events: mpsc::UnboundedSender<RoomEvent>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            room,
            local,
            in_call: false,
            muted: false,
            participants: Vec::new(),
            links: HashMap::new(),
            media: None,
            capture: stack.capture,
            sink: stack.sink,
            factory: stack.factory,
            outlet,
            sender,
            events,
            retry,
        }
    }

    pub fn is_in_call(&self) -> bool {
        self.in_call
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn participants(&self) -> &[MemberName] {
        &self.participants
    }

    /// Join the call. Capture comes up first; only once it is running
    /// does the join announcement go out.
    pub async fn join(&mut self) -> Result<(), CaptureError> {
        if self.in_call {
            return Ok(());
        }
        self.ensure_media().await?;
        self.in_call = true;
        let _ = self.sender.send(ClientMessage::JoinCall {
            room: self.room.clone(),
            name: self.local.clone(),
        });
        info!("Joined the call in {}", self.room);
        self.notify(CallEvent::Joined);
        Ok(())
    }

    /// Leave the call: announce it, close every link and release the
    /// capture device.
    pub async fn leave(&mut self) {
        if !self.in_call && self.links.is_empty() && self.media.is_none() {
            return;
        }
        let was_in_call = self.in_call;
        if was_in_call {
            let _ = self.sender.send(ClientMessage::LeaveCall {
                room: self.room.clone(),
                name: self.local.clone(),
            });
        }
        self.in_call = false;
        for (_, link) in self.links.drain() {
            link.close().await;
        }
        // Dropping the last media handle stops the capture pump.
        self.media = None;
        self.muted = false;
        self.participants.clear();
        if was_in_call {
            info!("Left the call in {}", self.room);
            self.notify(CallEvent::Ended);
        }
    }

    /// Flip the mute flag on the live outbound stream. No renegotiation
    /// happens; links keep running.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if let Some(media) = &self.media {
            media.set_enabled(!muted);
        }
        self.notify(CallEvent::MuteChanged { muted });
    }

    pub async fn on_participant_joined(&mut self, name: MemberName) {
        if name == self.local {
            return;
        }
        if !self.participants.contains(&name) {
            self.participants.push(name.clone());
        }
        self.notify(CallEvent::ParticipantJoined { name: name.clone() });
        if !self.in_call || self.links.contains_key(&name) {
            return;
        }
        let Some(media) = self.media.clone() else {
            return;
        };
        debug!("Offering to call newcomer {}", name);
        let link = self.spawn_link(name.clone(), media);
        link.start_offer().await;
        self.links.insert(name, link);
    }

    pub async fn on_participant_left(&mut self, name: MemberName) {
        self.participants.retain(|p| p != &name);
        if let Some(link) = self.links.remove(&name) {
            link.close().await;
        }
        if name != self.local {
            self.notify(CallEvent::ParticipantLeft { name });
        }
    }

    /// Replace the roster with the coordinator's snapshot and close
    /// links to peers that are no longer in the call.
    pub async fn on_current_participants(&mut self, participants: Vec<MemberName>) {
        self.participants = participants
            .into_iter()
            .filter(|p| p != &self.local)
            .collect();
        debug!("Call roster is now {:?}", self.participants);

        let stale: Vec<MemberName> = self
            .links
            .keys()
            .filter(|name| !self.participants.contains(name))
            .cloned()
            .collect();
        for name in stale {
            debug!("Closing link to {} who is no longer in the call", name);
            if let Some(link) = self.links.remove(&name) {
                link.close().await;
            }
        }
    }

    /// Handle a relayed offer. Receiving one pulls this client into the
    /// media exchange even before it joins the call itself, so capture
    /// is brought up on demand here.
    pub async fn on_offer(&mut self, sender: MemberName, payload: Value) {
        let offer: SessionDescription = match serde_json::from_value(payload) {
            Ok(offer) => offer,
            Err(e) => {
                warn!("Malformed offer from {}: {}", sender, e);
                return;
            }
        };
        if let Err(e) = self.ensure_media().await {
            warn!("Cannot answer offer from {}: {}", sender, e);
            self.notify(CallEvent::CaptureFailed {
                message: e.to_string(),
            });
            return;
        }
        let Some(media) = self.media.clone() else {
            return;
        };
        if !self.links.contains_key(&sender) {
            let link = self.spawn_link(sender.clone(), media);
            self.links.insert(sender.clone(), link);
        }
        if let Some(link) = self.links.get(&sender) {
            link.remote_offer(offer).await;
        }
    }

    pub async fn on_answer(&mut self, sender: MemberName, payload: Value) {
        let answer: SessionDescription = match serde_json::from_value(payload) {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Malformed answer from {}: {}", sender, e);
                return;
            }
        };
        match self.links.get(&sender) {
            Some(link) => link.remote_answer(answer).await,
            None => debug!("Dropping answer from {} with no link open", sender),
        }
    }

    pub async fn on_candidate(&mut self, sender: MemberName, payload: Value) {
        let candidate: IceCandidate = match serde_json::from_value(payload) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("Malformed candidate from {}: {}", sender, e);
                return;
            }
        };
        match self.links.get(&sender) {
            Some(link) => link.remote_candidate(candidate).await,
            None => debug!("Dropping candidate from {} with no link open", sender),
        }
    }

    async fn ensure_media(&mut self) -> Result<(), CaptureError> {
        if self.media.is_some() {
            return Ok(());
        }
        let media = LocalMedia::open(self.capture.as_ref()).await?;
        media.set_enabled(!self.muted);
        self.media = Some(media);
        Ok(())
    }

    fn spawn_link(&self, remote: MemberName, media: Arc<LocalMedia>) -> PeerLinkHandle {
        PeerLinkHandle::spawn(
            remote,
            Arc::clone(&self.factory),
            media,
            Arc::clone(&self.sink),
            Arc::clone(&self.outlet),
            self.events.clone(),
            self.retry.clone(),
        )
    }

    fn notify(&self, event: CallEvent) {
        let _ = self.events.send(RoomEvent::Call(event));
    }
}
