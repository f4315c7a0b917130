use huddle_core::MemberName;

/// Call lifecycle notifications surfaced to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    /// The local member is in the call and capture is running.
    Joined,
    /// The local member left the call and every link was released.
    Ended,
    ParticipantJoined { name: MemberName },
    ParticipantLeft { name: MemberName },
    /// Media to this peer is flowing.
    PeerConnected { name: MemberName },
    /// The retry budget for this peer is exhausted; its link is closed.
    PeerUnreachable { name: MemberName },
    /// The capture device could not be opened. If this was a call join
    /// it was aborted before any signaling went out.
    CaptureFailed { message: String },
    MuteChanged { muted: bool },
}
