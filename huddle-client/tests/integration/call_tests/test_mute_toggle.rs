use std::sync::Arc;

use tokio::sync::mpsc;

use huddle_client::{
    CallEvent, CallSession, DiscardSink, MediaStack, RetryPolicy, RoomEvent, SignalSender,
};
use huddle_core::{ClientMessage, MemberName, RoomId};

use crate::init_tracing;
use crate::utils::{MockLinkFactory, RecordingOutlet, ScriptedCapture, next_on};

#[tokio::test]
async fn test_mute_toggle() {
    init_tracing();

    let capture = ScriptedCapture::granted();
    let factory = MockLinkFactory::new();
    let (outlet, mut signals) = RecordingOutlet::new();
    let (message_tx, mut messages) = mpsc::unbounded_channel();
    let (event_tx, mut events) = mpsc::unbounded_channel();

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

    // Muting before the call starts is remembered for join.
    call.set_muted(true);
    assert!(call.is_muted());
    assert_eq!(
        next_on(&mut events, "the first mute notification").await,
        RoomEvent::Call(CallEvent::MuteChanged { muted: true })
    );

    call.join().await.expect("join the call");
    assert_eq!(
        next_on(&mut events, "the joined notification").await,
        RoomEvent::Call(CallEvent::Joined)
    );

    call.set_muted(false);
    assert!(!call.is_muted());
    assert_eq!(
        next_on(&mut events, "the second mute notification").await,
        RoomEvent::Call(CallEvent::MuteChanged { muted: false })
    );

    // Mute is local: no announcement beyond the join, no negotiation.
    let announced = next_on(&mut messages, "the join announcement").await;
    assert!(matches!(announced, ClientMessage::JoinCall { .. }));
    assert!(messages.try_recv().is_err());
    assert!(signals.try_recv().is_err());
    assert_eq!(factory.opened(), 0);
}
