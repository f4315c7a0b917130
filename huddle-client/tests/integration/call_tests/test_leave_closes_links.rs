use std::sync::Arc;

use tokio::sync::mpsc;

use huddle_client::{
    CallEvent, CallSession, DiscardSink, MediaStack, RetryPolicy, RoomEvent, SignalSender,
};
use huddle_core::{ClientMessage, MemberName, RoomId};

use crate::init_tracing;
use crate::utils::{LinkCall, MockLinkFactory, RecordingOutlet, ScriptedCapture, next_on};

#[tokio::test]
async fn test_leave_closes_links() {
    init_tracing();

    let capture = ScriptedCapture::granted();
    let factory = MockLinkFactory::new();
    let (outlet, mut signals) = RecordingOutlet::new();
    let (message_tx, mut messages) = mpsc::unbounded_channel();
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let bob = MemberName::from("Bob");

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

    call.leave().await;

    // The departure went out after the join, the link is closed and the
    // session is back to a blank slate.
    let joined = next_on(&mut messages, "the join announcement").await;
    assert!(matches!(joined, ClientMessage::JoinCall { .. }));
    let left = next_on(&mut messages, "the leave announcement").await;
    assert!(matches!(left, ClientMessage::LeaveCall { .. }));
    assert_eq!(factory.calls_for(0).await.last(), Some(&LinkCall::Close));
    assert!(!call.is_in_call());
    assert!(call.participants().is_empty());

    assert_eq!(
        next_on(&mut events, "the joined notification").await,
        RoomEvent::Call(CallEvent::Joined)
    );
    assert_eq!(
        next_on(&mut events, "the participant notification").await,
        RoomEvent::Call(CallEvent::ParticipantJoined { name: bob.clone() })
    );
    assert_eq!(
        next_on(&mut events, "the ended notification").await,
        RoomEvent::Call(CallEvent::Ended)
    );

    // Leaving again changes nothing.
    call.leave().await;
    assert!(messages.try_recv().is_err());
    assert!(events.try_recv().is_err());
}
