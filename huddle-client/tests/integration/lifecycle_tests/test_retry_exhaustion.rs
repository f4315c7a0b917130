use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use huddle_client::{CallEvent, DiscardSink, PeerLinkHandle, RetryPolicy, RoomEvent};
use huddle_core::MemberName;

use crate::init_tracing;
use crate::utils::{MockLinkFactory, RecordingOutlet, next_on, test_media};

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion() {
    init_tracing();

    let factory = MockLinkFactory::new();
    factory.fail_offers(usize::MAX);
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
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        },
    );

    link.start_offer().await;

    // Every attempt fails; the budget runs out and the peer is reported
    // unreachable. No earlier event leaks out.
    let event = next_on(&mut events, "the unreachable notification").await;
    assert_eq!(
        event,
        RoomEvent::Call(CallEvent::PeerUnreachable { name: bob.clone() })
    );

    // The initial attempt plus three re-attempts.
    assert_eq!(factory.opened(), 4);
    assert!(outlet.offers_for(&bob).await.is_empty());

    // The task is gone; later commands drop harmlessly.
    link.start_offer().await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(factory.opened(), 4);
}
