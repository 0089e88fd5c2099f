use camino::Utf8PathBuf;

use kira_media_tracker::domain::{MediaId, MediaStatus, Metadata, TrackedItem};
use kira_media_tracker::queue::UnresolvedSet;
use kira_media_tracker::store::{JsonStore, MetadataCache, Storage};

fn temp_store() -> (tempfile::TempDir, JsonStore) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    let store = JsonStore::new(root);
    store.ensure_root().unwrap();
    (temp, store)
}

#[test]
fn json_store_persists_every_key() {
    let (_temp, store) = temp_store();

    let mut item = TrackedItem::new(MediaId::new(1), "Cowboy Bebop");
    item.episodes_watched = 3;
    item.media_status = Some(MediaStatus::Finished);
    store.save_collection(&[item.clone()]);

    let unresolved: UnresolvedSet = [MediaId::new(9)].into_iter().collect();
    store.save_unresolved(&unresolved);

    let mut cache = MetadataCache::new();
    cache.insert(
        MediaId::new(1),
        Metadata {
            description: Some("Space bounty hunters.".to_string()),
            ..Metadata::default()
        },
    );
    store.save_metadata_cache(&cache);

    let reopened = JsonStore::new(store.root().to_owned());
    assert_eq!(reopened.load_collection(), Some(vec![item]));
    assert_eq!(reopened.load_unresolved(), unresolved);
    assert_eq!(reopened.load_metadata_cache(), cache);
}

#[test]
fn json_store_tolerates_missing_and_corrupt_files() {
    let (_temp, store) = temp_store();
    assert_eq!(store.load_collection(), None);
    assert!(store.load_unresolved().is_empty());

    std::fs::write(store.unresolved_path().as_std_path(), b"{not json").unwrap();
    assert!(store.load_unresolved().is_empty());
}

#[test]
fn atomic_write_leaves_no_temp_files() {
    let (_temp, store) = temp_store();
    store.save_collection(&[TrackedItem::new(MediaId::new(2), "Trigun")]);
    store.save_collection(&[TrackedItem::new(MediaId::new(3), "Monster")]);

    let names: Vec<String> = std::fs::read_dir(store.root().as_std_path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["collection.json".to_string()]);
}
