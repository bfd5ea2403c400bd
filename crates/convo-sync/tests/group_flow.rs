mod support;

use convo_store::MemoryStore;
use convo_sync::{
    GroupEvent, GroupMembership, ManualClock, MessageBody, SyncConfig, SyncError,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use support::FailingUpdateStore;

fn members(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn creator_is_always_a_member() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(1_000));
    let groups = GroupMembership::new(store, clock, SyncConfig::default());

    let group_id = groups
        .create("Eng", "u1", members(&["u2", "u3"]))
        .await
        .unwrap();

    let mut sub = groups.observe(&group_id).await.unwrap();
    let GroupEvent::Updated(group) = sub.recv().await.unwrap() else {
        panic!("expected a group snapshot");
    };
    assert_eq!(group.name, "Eng");
    assert_eq!(group.created_by, "u1");
    assert_eq!(group.members, members(&["u1", "u2", "u3"]));
    assert_eq!(group.last_message, "");
}

#[tokio::test]
async fn group_name_is_trimmed_and_validated() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(0));
    let groups = GroupMembership::new(store, clock, SyncConfig::default());

    assert!(matches!(
        groups.create("   ", "u1", members(&["u2"])).await,
        Err(SyncError::InvalidGroupName(_))
    ));
    assert!(matches!(
        groups.create(&"x".repeat(51), "u1", members(&["u2"])).await,
        Err(SyncError::InvalidGroupName(_))
    ));
    assert!(matches!(
        groups.create("Eng", "u1", BTreeSet::new()).await,
        Err(SyncError::EmptyMemberSet)
    ));

    let group_id = groups
        .create("  Eng  ", "u1", members(&["u2"]))
        .await
        .unwrap();
    let mut sub = groups.observe(&group_id).await.unwrap();
    let GroupEvent::Updated(group) = sub.recv().await.unwrap() else {
        panic!("expected a group snapshot");
    };
    assert_eq!(group.name, "Eng");
}

#[tokio::test]
async fn posting_updates_the_summary_to_the_message() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(5_000));
    let groups = GroupMembership::new(store, clock.clone(), SyncConfig::default());

    let group_id = groups
        .create("Eng", "u1", members(&["u2", "u3"]))
        .await
        .unwrap();

    clock.set(6_000);
    let message = groups
        .post_message(&group_id, "u1", Some("Ada".into()), MessageBody::text("ship it"))
        .await
        .unwrap();
    assert_eq!(message.sent_at, 6_000);
    assert_eq!(message.sender_name.as_deref(), Some("Ada"));

    let mut sub = groups.observe(&group_id).await.unwrap();
    let GroupEvent::Updated(group) = sub.recv().await.unwrap() else {
        panic!("expected a group snapshot");
    };
    assert_eq!(group.last_message, "ship it");
    assert_eq!(group.last_message_time, 6_000);
}

#[tokio::test]
async fn location_posts_summarize_as_placeholder() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(0));
    let groups = GroupMembership::new(store, clock, SyncConfig::default());

    let group_id = groups.create("Eng", "u1", members(&["u2"])).await.unwrap();
    groups
        .post_message(
            &group_id,
            "u1",
            None,
            MessageBody::Location {
                latitude: 48.85,
                longitude: 2.35,
            },
        )
        .await
        .unwrap();

    let mut sub = groups.observe(&group_id).await.unwrap();
    let GroupEvent::Updated(group) = sub.recv().await.unwrap() else {
        panic!("expected a group snapshot");
    };
    assert_eq!(group.last_message, convo_sync::LOCATION_PLACEHOLDER);
}

#[tokio::test]
async fn failed_summary_update_surfaces_partial_failure_with_the_message() {
    let store = Arc::new(FailingUpdateStore::new());
    let clock = Arc::new(ManualClock::new(42));
    let groups = GroupMembership::new(store.clone(), clock, SyncConfig::default());

    // Creation uses write, which this store accepts.
    let group_id = groups.create("Eng", "u1", members(&["u2"])).await.unwrap();

    let result = groups
        .post_message(&group_id, "u1", None, MessageBody::text("orphan"))
        .await;
    let Err(SyncError::PartialUpdateFailure { message, .. }) = result else {
        panic!("expected PartialUpdateFailure, got {result:?}");
    };
    assert_eq!(message.summary_text(), "orphan");

    // The message itself reached the feed; only the summary is stale.
    let stored = store
        .inner
        .snapshot(&convo_sync::paths::group_messages(&group_id));
    assert_eq!(stored.as_object().map(|m| m.len()), Some(1));
}

#[tokio::test]
async fn delete_removes_the_group_and_its_messages() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(0));
    let groups = GroupMembership::new(store.clone(), clock, SyncConfig::default());

    let group_id = groups.create("Eng", "u1", members(&["u2"])).await.unwrap();
    groups
        .post_message(&group_id, "u1", None, MessageBody::text("bye"))
        .await
        .unwrap();

    let mut sub = groups.observe(&group_id).await.unwrap();
    assert!(matches!(sub.recv().await, Some(GroupEvent::Updated(_))));

    groups.delete(&group_id).await.unwrap();
    assert_eq!(
        store.snapshot(&convo_sync::paths::group(&group_id)),
        serde_json::Value::Null
    );
    assert!(matches!(sub.recv().await, Some(GroupEvent::Removed)));
}
