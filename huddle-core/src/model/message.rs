use crate::model::member::MemberName;
use crate::model::room::RoomId;
use crate::model::signal::IceServerConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One drawing segment as the canvas feature ships it. The coordinator
/// never interprets strokes; this shape exists so clients have a typed
/// handle on what they relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub color: String,
    pub width: f64,
    pub is_eraser: bool,
}

/// Everything a client may send the coordinator. Envelope is
/// `{"op": <event>, "d": {...}}`; unknown ops fail to parse and are
/// rejected at the transport boundary.
///
/// Negotiation payloads are opaque here. The coordinator relays them
/// untouched; only the two peers give them meaning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    Join {
        room: RoomId,
        name: MemberName,
    },
    /// Uses the connection's current association; carries nothing.
    LeaveRoom,
    CodeChange {
        room: RoomId,
        content: String,
    },
    Typing {
        room: RoomId,
        name: MemberName,
    },
    LanguageChange {
        room: RoomId,
        language: String,
    },
    Draw {
        room: RoomId,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        color: String,
        width: f64,
        is_eraser: bool,
    },
    JoinCall {
        room: RoomId,
        name: MemberName,
    },
    LeaveCall {
        room: RoomId,
        name: MemberName,
    },
    RequestParticipants {
        room: RoomId,
    },
    #[serde(rename = "negotiation-offer")]
    Offer {
        room: RoomId,
        payload: Value,
        sender: MemberName,
        receiver: Option<MemberName>,
    },
    #[serde(rename = "negotiation-answer")]
    Answer {
        room: RoomId,
        payload: Value,
        sender: MemberName,
        receiver: Option<MemberName>,
    },
    #[serde(rename = "negotiation-ice-candidate")]
    IceCandidate {
        room: RoomId,
        payload: Value,
        sender: MemberName,
        receiver: Option<MemberName>,
    },
}

impl ClientMessage {
    pub fn draw(room: RoomId, stroke: Stroke) -> Self {
        Self::Draw {
            room,
            x1: stroke.x1,
            y1: stroke.y1,
            x2: stroke.x2,
            y2: stroke.y2,
            color: stroke.color,
            width: stroke.width,
            is_eraser: stroke.is_eraser,
        }
    }
}

/// Everything the coordinator may send a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Greeting sent once when the socket is accepted.
    IceConfig {
        ice_servers: Vec<IceServerConfig>,
    },
    /// Full member-name list for the room, join order.
    MembershipUpdate {
        names: Vec<MemberName>,
    },
    /// Join refused; sent to the requester only.
    NameTaken {
        message: String,
    },
    ContentUpdate {
        content: String,
    },
    Typing {
        name: MemberName,
    },
    LanguageUpdate {
        language: String,
    },
    Draw {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        color: String,
        width: f64,
        is_eraser: bool,
    },
    CallParticipantJoined {
        name: MemberName,
    },
    CallParticipantLeft {
        name: MemberName,
    },
    /// Point-to-point call snapshot; receivers filter themselves out.
    CurrentParticipants {
        participants: Vec<MemberName>,
    },
    #[serde(rename = "negotiation-offer")]
    Offer {
        payload: Value,
        sender: MemberName,
    },
    #[serde(rename = "negotiation-answer")]
    Answer {
        payload: Value,
        sender: MemberName,
    },
    #[serde(rename = "negotiation-ice-candidate")]
    IceCandidate {
        payload: Value,
        sender: MemberName,
    },
}

impl ServerMessage {
    pub fn draw(stroke: Stroke) -> Self {
        Self::Draw {
            x1: stroke.x1,
            y1: stroke.y1,
            x2: stroke.x2,
            y2: stroke.y2,
            color: stroke.color,
            width: stroke.width,
            is_eraser: stroke.is_eraser,
        }
    }
}
