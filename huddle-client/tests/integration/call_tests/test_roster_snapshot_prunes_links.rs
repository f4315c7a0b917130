use std::sync::Arc;

use tokio::sync::mpsc;

use huddle_client::{CallSession, DiscardSink, MediaStack, RetryPolicy, SignalSender};
use huddle_core::{MemberName, RoomId};

use crate::init_tracing;
use crate::utils::{LinkCall, MockLinkFactory, RecordingOutlet, ScriptedCapture, next_on};

#[tokio::test]
async fn test_roster_snapshot_prunes_links() {
    init_tracing();

    let capture = ScriptedCapture::granted();
    let factory = MockLinkFactory::new();
    let (outlet, mut signals) = RecordingOutlet::new();
    let (message_tx, _messages) = mpsc::unbounded_channel();
    let (event_tx, _events) = mpsc::unbounded_channel();
    let bob = MemberName::from("Bob");
    let carol = MemberName::from("Carol");

    let mut call = CallSession::new(
        RoomId::from("dock"),
        MemberName::from("Alice"),
        SignalSender::new(message_tx),
        Arc::new(outlet.clone()),
        MediaStack {
            capture: capture.clone(),
            sink: Arc::new(DiscardSink),
            factory: Arc::new(factory.clone()),
        },
        event_tx,
        RetryPolicy::default(),
    );

    call.join().await.expect("join the call");
    call.on_participant_joined(bob.clone()).await;
    next_on(&mut signals, "the offer to Bob").await;
    call.on_participant_joined(carol.clone()).await;
    next_on(&mut signals, "the offer to Carol").await;
    assert_eq!(factory.opened(), 2);

    // The coordinator's snapshot no longer lists Bob; our own name is
    // filtered out rather than kept as a peer.
    call.on_current_participants(vec![carol.clone(), MemberName::from("Alice")])
        .await;
    assert_eq!(call.participants(), &[carol.clone()]);
    assert_eq!(factory.calls_for(0).await.last(), Some(&LinkCall::Close));
    assert!(!factory.calls_for(1).await.contains(&LinkCall::Close));
}
