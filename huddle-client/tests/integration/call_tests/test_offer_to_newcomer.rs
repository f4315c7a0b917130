use std::sync::Arc;

use tokio::sync::mpsc;

use huddle_client::{
    CallEvent, CallSession, DiscardSink, MediaStack, RetryPolicy, RoomEvent, SignalSender,
};
use huddle_core::{ClientMessage, MemberName, RoomId};

use crate::init_tracing;
use crate::utils::{MockLinkFactory, RecordingOutlet, ScriptedCapture, SentSignal, next_on};

#[tokio::test]
async fn test_offer_to_newcomer() {
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
    assert!(capture.was_opened());
    let announced = next_on(&mut messages, "the call join announcement").await;
    assert!(matches!(
        announced,
        ClientMessage::JoinCall { ref room, ref name }
            if room == &RoomId::from("dock") && name == &MemberName::from("Alice")
    ));
    assert_eq!(
        next_on(&mut events, "the joined notification").await,
        RoomEvent::Call(CallEvent::Joined)
    );

    // The fanout echo of our own join adds no link.
    call.on_participant_joined(MemberName::from("Alice")).await;
    assert_eq!(factory.opened(), 0);
    assert!(call.participants().is_empty());

    // A newcomer gets an offer from everyone already in the call.
    call.on_participant_joined(bob.clone()).await;
    assert_eq!(
        next_on(&mut events, "the participant notification").await,
        RoomEvent::Call(CallEvent::ParticipantJoined { name: bob.clone() })
    );
    let offer = next_on(&mut signals, "the offer to the newcomer").await;
    assert!(matches!(offer, SentSignal::Offer { ref to, .. } if to == &bob));
    assert_eq!(factory.opened(), 1);
    assert_eq!(call.participants(), &[bob.clone()]);

    // A repeated announcement does not renegotiate.
    call.on_participant_joined(bob.clone()).await;
    assert_eq!(factory.opened(), 1);
    assert_eq!(outlet.offers_for(&bob).await.len(), 1);
    assert_eq!(call.participants(), &[bob.clone()]);
}
