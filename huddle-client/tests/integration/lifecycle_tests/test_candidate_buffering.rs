use std::sync::Arc;

use tokio::sync::mpsc;

use huddle_client::{DiscardSink, PeerLinkHandle, RetryPolicy};
use huddle_core::{IceCandidate, MemberName, SessionDescription};

use crate::init_tracing;
use crate::utils::{LinkCall, MockLinkFactory, RecordingOutlet, next_on, test_media};

fn candidate(n: u16) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{n} 1 UDP 2122252543 192.0.2.{n} 40000 typ host"),
        sdp_mid: Some("0".to_owned()),
        sdp_m_line_index: Some(0),
        username_fragment: None,
    }
}

#[tokio::test]
async fn test_candidate_buffering() {
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

    // A candidate with no link at all is dropped outright.
    link.remote_candidate(candidate(9)).await;

    link.start_offer().await;
    next_on(&mut signals, "the outgoing offer").await;

    // Candidates racing ahead of the answer are held back and applied
    // in arrival order once the answer lands.
    link.remote_candidate(candidate(1)).await;
    link.remote_candidate(candidate(2)).await;
    let answer = SessionDescription::answer("v=0 remote".to_owned());
    link.remote_answer(answer.clone()).await;

    assert!(
        factory.wait_for_calls(4, 1000).await,
        "buffered candidates never flushed"
    );
    assert_eq!(
        factory.calls_for(0).await,
        vec![
            LinkCall::CreateOffer,
            LinkCall::ApplyAnswer(answer),
            LinkCall::AddCandidate(candidate(1)),
            LinkCall::AddCandidate(candidate(2)),
        ]
    );

    link.close().await;
}
