use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;

use huddle_client::{CallSession, DiscardSink, MediaStack, RetryPolicy, SignalSender};
use huddle_core::{MemberName, RoomId, SessionDescription};

use crate::init_tracing;
use crate::utils::{MockLinkFactory, RecordingOutlet, ScriptedCapture, SentSignal, next_on};

#[tokio::test]
async fn test_answer_before_join() {
    init_tracing();

    let capture = ScriptedCapture::granted();
    let factory = MockLinkFactory::new();
    let (outlet, mut signals) = RecordingOutlet::new();
    let (message_tx, mut messages) = mpsc::unbounded_channel();
    let (event_tx, _events) = mpsc::unbounded_channel();
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

    // Garbage payloads drop before any capture side effects.
    call.on_offer(bob.clone(), json!({"sdp": 41})).await;
    assert!(!capture.was_opened());
    assert_eq!(factory.opened(), 0);

    // A genuine offer pulls media up and answers it, without joining
    // the call or announcing anything.
    let payload = serde_json::to_value(SessionDescription::offer("v=0 remote".to_owned()))
        .expect("serialize offer");
    call.on_offer(bob.clone(), payload).await;
    let answer = next_on(&mut signals, "the answer").await;
    assert!(matches!(answer, SentSignal::Answer { ref to, .. } if to == &bob));
    assert!(capture.was_opened());
    assert!(!call.is_in_call());
    assert!(messages.try_recv().is_err());
}
