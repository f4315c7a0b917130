use serde_json::json;

use huddle_core::{MemberName, RoomId};
use huddle_server::{RegistryHandle, SignalKind};

use crate::init_tracing;
use crate::utils::TestConnection;

#[tokio::test]
async fn test_relay_guards() {
    init_tracing();

    let registry = RegistryHandle::spawn();
    let room = RoomId::from("guarded");

    let mut alice = TestConnection::join(&registry, &room, "Alice")
        .await
        .expect("Alice joins");
    let mut bob = TestConnection::join(&registry, &room, "Bob")
        .await
        .expect("Bob joins");
    alice.drain().await;

    let payload = json!({"type": "offer", "sdp": "v=0"});

    // A receiver that is not in the room: dropped silently.
    registry
        .relay(
            room.clone(),
            alice.id,
            SignalKind::Offer,
            MemberName::from("Alice"),
            payload.clone(),
            Some(MemberName::from("Mallory")),
        )
        .await
        .expect("registry is gone");
    bob.expect_silence("signal for an unknown receiver").await.unwrap();

    // A sender name the connection does not hold: dropped.
    registry
        .relay(
            room.clone(),
            bob.id,
            SignalKind::Offer,
            MemberName::from("Alice"),
            payload.clone(),
            Some(MemberName::from("Alice")),
        )
        .await
        .expect("registry is gone");
    alice.expect_silence("forged sender identity").await.unwrap();

    // A connection with no membership in the room: dropped.
    let stranger = TestConnection::new();
    registry
        .relay(
            room.clone(),
            stranger.id,
            SignalKind::IceCandidate,
            MemberName::from("Alice"),
            payload,
            None,
        )
        .await
        .expect("registry is gone");
    alice.expect_silence("signal from outside the room").await.unwrap();
    bob.expect_silence("signal from outside the room").await.unwrap();
}
