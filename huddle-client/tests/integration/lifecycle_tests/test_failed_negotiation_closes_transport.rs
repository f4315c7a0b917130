use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use huddle_client::{DiscardSink, PeerLinkHandle, RetryPolicy};
use huddle_core::{MemberName, SessionDescription};

use crate::init_tracing;
use crate::utils::{LinkCall, MockLinkFactory, RecordingOutlet, test_media};

#[tokio::test(start_paused = true)]
async fn test_failed_negotiation_closes_transport() {
    init_tracing();

    let factory = MockLinkFactory::new();
    let (outlet, _signals) = RecordingOutlet::new();
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let bob = MemberName::from("Bob");

    let link = PeerLinkHandle::spawn(
        bob.clone(),
        Arc::new(factory.clone()),
        test_media().await,
        Arc::new(DiscardSink),
        Arc::new(outlet.clone()),
        event_tx,
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(1),
        },
    );

    // A failed local offer must close the transport it just opened.
    factory.fail_offers(1);
    link.start_offer().await;
    assert!(
        factory.wait_for_calls(2, 1000).await,
        "offer link never torn down"
    );
    assert_eq!(
        factory.calls_for(0).await,
        vec![LinkCall::CreateOffer, LinkCall::Close]
    );

    // Same for a remote offer the transport refuses to answer.
    factory.fail_answers(1);
    let offer = SessionDescription::offer("v=0 unanswerable".to_owned());
    link.remote_offer(offer.clone()).await;
    assert!(
        factory.wait_for_calls(4, 1000).await,
        "answer link never torn down"
    );
    assert_eq!(
        factory.calls_for(1).await,
        vec![LinkCall::AcceptOffer(offer), LinkCall::Close]
    );

    link.close().await;
    assert_eq!(factory.opened(), 2);
    assert!(outlet.offers_for(&bob).await.is_empty());
    assert!(outlet.answers_for(&bob).await.is_empty());
    assert!(
        events.try_recv().is_err(),
        "no event while re-attempts remain"
    );
}
