use std::sync::Arc;

use tokio::sync::mpsc;

use huddle_client::{DiscardSink, PeerLinkHandle, RetryPolicy};
use huddle_core::{IceCandidate, MemberName, SdpKind, SessionDescription};

use crate::init_tracing;
use crate::utils::{LinkCall, MockLinkFactory, RecordingOutlet, SentSignal, next_on, test_media};

#[tokio::test]
async fn test_answer_flow() {
    init_tracing();

    let factory = MockLinkFactory::new();
    let (outlet, mut signals) = RecordingOutlet::new();
    let (event_tx, _events) = mpsc::unbounded_channel();
    let bob = MemberName::from("Bob");

    let link = PeerLinkHandle::spawn(
        bob.clone(),
        Arc::new(factory.clone()),
        test_media().await,
        Arc::new(DiscardSink),
        Arc::new(outlet.clone()),
        event_tx,
        RetryPolicy::default(),
    );

    let offer = SessionDescription::offer("v=0 remote".to_owned());
    link.remote_offer(offer.clone()).await;
    let answer = next_on(&mut signals, "the outgoing answer").await;
    assert!(matches!(
        answer,
        SentSignal::Answer { ref to, ref description }
            if to == &bob && description.kind == SdpKind::Answer
    ));

    // With the remote description in place candidates apply directly.
    let candidate = IceCandidate {
        candidate: "candidate:2 1 UDP 2122252542 192.0.2.8 40001 typ host".to_owned(),
        sdp_mid: Some("0".to_owned()),
        sdp_m_line_index: Some(0),
        username_fragment: None,
    };
    link.remote_candidate(candidate.clone()).await;
    assert!(
        factory.wait_for_calls(2, 1000).await,
        "candidate never applied"
    );

    assert_eq!(factory.opened(), 1);
    assert_eq!(
        factory.calls_for(0).await,
        vec![
            LinkCall::AcceptOffer(offer),
            LinkCall::AddCandidate(candidate)
        ]
    );

    link.close().await;
}
