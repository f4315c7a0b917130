use huddle_core::{MemberName, RoomId};
use huddle_server::RegistryHandle;

use crate::init_tracing;
use crate::utils::TestConnection;

#[tokio::test]
async fn test_rapid_membership_churn() {
    init_tracing();

    let registry = RegistryHandle::spawn();
    let room = RoomId::from("churn");

    let mut anchor = TestConnection::join(&registry, &room, "Anchor")
        .await
        .expect("anchor joins");

    for i in 0..10 {
        let name = format!("Guest{i}");
        let guest = TestConnection::new();
        registry
            .join(room.clone(), MemberName::from(name.as_str()), guest.handle.clone())
            .await
            .expect("registry is gone");
        let names = anchor.expect_membership().await.expect("guest arrival");
        assert_eq!(names.last(), Some(&MemberName::from(name.as_str())));

        // Alternate the two release paths; both must converge.
        if i % 2 == 0 {
            registry.leave(guest.id).await.expect("registry is gone");
        } else {
            registry.disconnect(guest.id).await.expect("registry is gone");
        }
        let names = anchor.expect_membership().await.expect("guest departure");
        assert_eq!(names, vec![MemberName::from("Anchor")]);

        // The other path firing afterwards must change nothing.
        registry.disconnect(guest.id).await.expect("registry is gone");
    }

    anchor.expect_silence("stable membership").await.unwrap();
}
