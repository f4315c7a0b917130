use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use huddle_core::{IceCandidate, IceServerConfig, MemberName, SessionDescription};

use crate::error::LinkError;
use crate::media::{AudioSink, LocalMedia};
use crate::peer::transport::{LinkEvent, MediaLink, MediaLinkFactory};

/// STUN servers used until the coordinator supplies its own set.
pub fn default_ice_servers() -> Vec<IceServerConfig> {
    vec![
        IceServerConfig::urls(vec!["stun:stun.l.google.com:19302".into()]),
        IceServerConfig::urls(vec!["stun:stun1.l.google.com:19302".into()]),
    ]
}

/// Opens WebRTC-backed media links.
pub struct RtcLinkFactory {
    ice_servers: RwLock<Vec<IceServerConfig>>,
}

impl RtcLinkFactory {
    pub fn new() -> Self {
        Self {
            ice_servers: RwLock::new(default_ice_servers()),
        }
    }
}

impl Default for RtcLinkFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaLinkFactory for RtcLinkFactory {
    async fn configure_ice(&self, servers: Vec<IceServerConfig>) {
        debug!("ICE configuration updated ({} servers)", servers.len());
        *self.ice_servers.write().await = servers;
    }

    async fn open(
        &self,
        remote: MemberName,
        media: Arc<LocalMedia>,
        sink: Arc<dyn AudioSink>,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Box<dyn MediaLink>, LinkError> {
        let ice_servers = self.ice_servers.read().await.clone();
        let link = RtcLink::open(remote, ice_servers, media, sink, events).await?;
        Ok(Box::new(link))
    }
}

/// A live WebRTC peer connection carrying one outbound audio track and
/// rendering at most one inbound track into the sink.
pub struct RtcLink {
    remote: MemberName,
    peer_connection: Arc<RTCPeerConnection>,
}

impl RtcLink {
    async fn open(
        remote: MemberName,
        ice_servers: Vec<IceServerConfig>,
        media: Arc<LocalMedia>,
        sink: Arc<dyn AudioSink>,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Self, LinkError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(transport)?;
        let registry =
            register_default_interceptors(Registry::new(), &mut media_engine).map_err(transport)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: ice_servers.into_iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };
        let peer_connection = Arc::new(
            api.new_peer_connection(config)
                .await
                .map_err(transport)?,
        );

        let rtp_sender = peer_connection
            .add_track(media.track() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(transport)?;
        // Drain RTCP so the interceptors keep processing feedback.
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while let Ok((_, _)) = rtp_sender.read(&mut rtcp_buf).await {}
        });

        let state_events = events.clone();
        let state_remote = remote.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let events = state_events.clone();
                let remote = state_remote.clone();
                Box::pin(async move {
                    debug!("Peer connection to {} is now {}", remote, state);
                    let event = match state {
                        RTCPeerConnectionState::Connected => Some(LinkEvent::Connected),
                        RTCPeerConnectionState::Failed => Some(LinkEvent::Failed),
                        RTCPeerConnectionState::Disconnected => Some(LinkEvent::Disconnected),
                        _ => None,
                    };
                    if let Some(event) = event {
                        let _ = events.send(event).await;
                    }
                })
            },
        ));

        let candidate_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let events = candidate_events.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => {
                        let candidate = IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_m_line_index: init.sdp_mline_index,
                            username_fragment: init.username_fragment,
                        };
                        let _ = events.send(LinkEvent::Candidate(candidate)).await;
                    }
                    Err(e) => warn!("Failed to serialize local candidate: {}", e),
                }
            })
        }));

        // Only the first inbound track is rendered; one audio stream per
        // peer is the contract.
        let rendering = Arc::new(AtomicBool::new(false));
        let track_remote = remote.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let rendering = Arc::clone(&rendering);
                let sink = Arc::clone(&sink);
                let from = track_remote.clone();
                Box::pin(async move {
                    if rendering.swap(true, Ordering::SeqCst) {
                        debug!("Ignoring additional inbound track from {}", from);
                        return;
                    }
                    tokio::spawn(render_inbound(track, from, sink));
                })
            },
        ));

        Ok(Self {
            remote,
            peer_connection,
        })
    }
}

#[async_trait]
impl MediaLink for RtcLink {
    async fn create_offer(&self) -> Result<SessionDescription, LinkError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(transport)?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .map_err(transport)?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn accept_offer(
        &self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, LinkError> {
        let remote = RTCSessionDescription::offer(offer.sdp).map_err(transport)?;
        self.peer_connection
            .set_remote_description(remote)
            .await
            .map_err(transport)?;
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(transport)?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .map_err(transport)?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn apply_answer(&self, answer: SessionDescription) -> Result<(), LinkError> {
        let remote = RTCSessionDescription::answer(answer.sdp).map_err(transport)?;
        self.peer_connection
            .set_remote_description(remote)
            .await
            .map_err(transport)?;
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), LinkError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(transport)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), LinkError> {
        debug!("Closing peer connection to {}", self.remote);
        self.peer_connection.close().await.map_err(transport)?;
        Ok(())
    }
}

async fn render_inbound(track: Arc<TrackRemote>, from: MemberName, sink: Arc<dyn AudioSink>) {
    loop {
        match track.read_rtp().await {
            Ok((packet, _)) => sink.on_frame(&from, &packet.payload),
            Err(_) => break,
        }
    }
    debug!("Inbound audio from {} ended", from);
}

fn to_rtc_ice_server(server: IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls,
        username: server.username.unwrap_or_default(),
        credential: server.credential.unwrap_or_default(),
    }
}

fn transport(e: webrtc::Error) -> LinkError {
    LinkError::Transport(e.to_string())
}
