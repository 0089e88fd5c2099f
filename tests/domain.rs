use kira_media_tracker::domain::{
    CandidateMatch, MediaId, MediaStatus, Metadata, TrackedItem, WatchStatus,
};
use kira_media_tracker::queue::{PendingQueue, missing_metadata_ids};

#[test]
fn tracked_item_reads_legacy_json_without_optional_fields() {
    let json = r#"{ "id": 5114, "title": "Fullmetal Alchemist: Brotherhood", "episodes_watched": 12 }"#;
    let item: TrackedItem = serde_json::from_str(json).unwrap();
    assert_eq!(item.id, MediaId::new(5114));
    assert_eq!(item.status, WatchStatus::PlanToWatch);
    assert_eq!(item.episodes_watched, 12);
    assert!(!item.has_complete_metadata());
}

#[test]
fn media_status_uses_service_spelling() {
    let status: MediaStatus = serde_json::from_str("\"NOT_YET_RELEASED\"").unwrap();
    assert_eq!(status, MediaStatus::NotYetReleased);
    assert_eq!(
        serde_json::to_string(&WatchStatus::OnHold).unwrap(),
        "\"on_hold\""
    );
}

#[test]
fn resolution_rekeys_and_keeps_user_fields() {
    let mut original = TrackedItem::new(MediaId::new(7), "Mislabelled");
    original.episodes_watched = 9;
    original.score = Some(7);
    original.status = WatchStatus::Completed;

    let candidate = CandidateMatch {
        id: MediaId::new(70),
        title: "Correct Title".to_string(),
        metadata: Metadata {
            description: Some("The right show.".to_string()),
            media_status: Some(MediaStatus::Finished),
            season: Some("Winter 2010".to_string()),
            ..Metadata::default()
        },
    };
    let resolved = original.resolved_with(&candidate);

    assert_eq!(resolved.id, MediaId::new(70));
    assert_eq!(resolved.title, "Correct Title");
    assert_eq!(resolved.episodes_watched, 9);
    assert_eq!(resolved.score, Some(7));
    assert_eq!(resolved.status, WatchStatus::Completed);
    assert_eq!(resolved.season.as_deref(), Some("Winter 2010"));
    assert!(resolved.has_complete_metadata());
}

#[test]
fn stripped_collection_is_fully_missing_again() {
    let mut item = TrackedItem::new(MediaId::new(1), "Bebop");
    item.merge(&Metadata {
        description: Some("text".to_string()),
        media_status: Some(MediaStatus::Finished),
        ..Metadata::default()
    });
    let items = vec![item.clone(), item.strip_to_identity()];
    assert_eq!(missing_metadata_ids(&items), vec![MediaId::new(1)]);

    let queue = PendingQueue::from_ids(missing_metadata_ids(&[item.strip_to_identity()]));
    assert_eq!(queue.front(), Some(MediaId::new(1)));
}
