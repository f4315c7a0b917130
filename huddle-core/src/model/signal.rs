use serde::{Deserialize, Serialize};

/// ICE server entry handed to clients in the connect greeting. Relayed
/// verbatim into the peer connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    /// Plain STUN/TURN url set with no credentials.
    pub fn urls(urls: Vec<String>) -> Self {
        Self {
            urls,
            username: None,
            credential: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Session description as it travels inside a negotiation payload. The
/// field casing matches the browser `RTCSessionDescription` JSON so either
/// kind of client can apply it directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: String) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp,
        }
    }

    pub fn answer(sdp: String) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp,
        }
    }
}

/// Trickled ICE candidate, browser `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u16>,
    pub username_fragment: Option<String>,
}
