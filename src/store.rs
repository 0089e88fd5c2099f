use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::Builder;
use tracing::{debug, warn};

use crate::domain::{MediaId, Metadata, TrackedItem};
use crate::error::KiraError;
use crate::queue::UnresolvedSet;

pub type MetadataCache = BTreeMap<MediaId, Metadata>;

const COLLECTION_FILE: &str = "collection.json";
const UNRESOLVED_FILE: &str = "unresolved.json";
const METADATA_CACHE_FILE: &str = "metadata-cache.json";

/// Key-value persistence for the tracker. Failures are logged and swallowed here.
pub trait Storage: Send {
    fn load_collection(&self) -> Option<Vec<TrackedItem>>;
    fn save_collection(&self, items: &[TrackedItem]);
    fn load_unresolved(&self) -> UnresolvedSet;
    fn save_unresolved(&self, unresolved: &UnresolvedSet);
    fn load_metadata_cache(&self) -> MetadataCache;
    fn save_metadata_cache(&self, cache: &MetadataCache);
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    root: Utf8PathBuf,
}

impl JsonStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn collection_path(&self) -> Utf8PathBuf {
        self.root.join(COLLECTION_FILE)
    }

    pub fn unresolved_path(&self) -> Utf8PathBuf {
        self.root.join(UNRESOLVED_FILE)
    }

    pub fn metadata_cache_path(&self) -> Utf8PathBuf {
        self.root.join(METADATA_CACHE_FILE)
    }

    pub fn ensure_root(&self) -> Result<(), KiraError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    pub fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<Option<T>, KiraError> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("read {path}: {err}")))?;
        let value = serde_json::from_str(&content)
            .map_err(|err| KiraError::Filesystem(format!("parse {path}: {err}")))?;
        Ok(Some(value))
    }

    pub fn write_json_atomic<T: Serialize + ?Sized>(
        path: &Utf8Path,
        value: &T,
    ) -> Result<(), KiraError> {
        let parent = path
            .parent()
            .ok_or_else(|| KiraError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let content = serde_json::to_vec_pretty(value)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix("kira-mt-store")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn load_or_warn<T: DeserializeOwned>(&self, path: Utf8PathBuf) -> Option<T> {
        match Self::read_json(&path) {
            Ok(value) => value,
            Err(err) => {
                warn!(%path, error = %err, "ignoring unreadable store file");
                None
            }
        }
    }

    fn save_or_warn<T: Serialize + ?Sized>(&self, path: Utf8PathBuf, value: &T) {
        match Self::write_json_atomic(&path, value) {
            Ok(()) => debug!(%path, "store file written"),
            Err(err) => warn!(%path, error = %err, "failed to write store file"),
        }
    }
}

impl Storage for JsonStore {
    fn load_collection(&self) -> Option<Vec<TrackedItem>> {
        self.load_or_warn(self.collection_path())
    }

    fn save_collection(&self, items: &[TrackedItem]) {
        self.save_or_warn(self.collection_path(), items);
    }

    fn load_unresolved(&self) -> UnresolvedSet {
        self.load_or_warn(self.unresolved_path()).unwrap_or_default()
    }

    fn save_unresolved(&self, unresolved: &UnresolvedSet) {
        self.save_or_warn(self.unresolved_path(), unresolved);
    }

    fn load_metadata_cache(&self) -> MetadataCache {
        self.load_or_warn(self.metadata_cache_path())
            .unwrap_or_default()
    }

    fn save_metadata_cache(&self, cache: &MetadataCache) {
        self.save_or_warn(self.metadata_cache_path(), cache);
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    collection: Option<Vec<TrackedItem>>,
    unresolved: UnresolvedSet,
    metadata_cache: MetadataCache,
    saves: usize,
}

/// In-process store. Clones share state, so a test can keep a handle for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(items: Vec<TrackedItem>) -> Self {
        let store = Self::default();
        store.save_collection(&items);
        store
    }

    pub fn collection(&self) -> Vec<TrackedItem> {
        self.state
            .lock()
            .map(|state| state.collection.clone().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn unresolved(&self) -> UnresolvedSet {
        self.state
            .lock()
            .map(|state| state.unresolved.clone())
            .unwrap_or_default()
    }

    pub fn metadata_cache(&self) -> MetadataCache {
        self.state
            .lock()
            .map(|state| state.metadata_cache.clone())
            .unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.state.lock().map(|state| state.saves).unwrap_or(0)
    }
}

impl Storage for MemoryStore {
    fn load_collection(&self) -> Option<Vec<TrackedItem>> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.collection.clone())
    }

    fn save_collection(&self, items: &[TrackedItem]) {
        if let Ok(mut state) = self.state.lock() {
            state.collection = Some(items.to_vec());
            state.saves += 1;
        }
    }

    fn load_unresolved(&self) -> UnresolvedSet {
        self.unresolved()
    }

    fn save_unresolved(&self, unresolved: &UnresolvedSet) {
        if let Ok(mut state) = self.state.lock() {
            state.unresolved = unresolved.clone();
            state.saves += 1;
        }
    }

    fn load_metadata_cache(&self) -> MetadataCache {
        self.metadata_cache()
    }

    fn save_metadata_cache(&self, cache: &MetadataCache) {
        if let Ok(mut state) = self.state.lock() {
            state.metadata_cache = cache.clone();
            state.saves += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = JsonStore::new(Utf8PathBuf::from("/data/kira-media-tracker"));
        assert!(store.collection_path().ends_with("collection.json"));
        assert!(store.unresolved_path().ends_with("unresolved.json"));
        assert!(store.metadata_cache_path().ends_with("metadata-cache.json"));
    }

    #[test]
    fn memory_store_shares_state_between_clones() {
        let store = MemoryStore::new();
        let handle = store.clone();
        store.save_unresolved(&[MediaId::new(4)].into_iter().collect());
        assert!(handle.unresolved().contains(MediaId::new(4)));
        assert_eq!(handle.save_count(), 1);
    }
}
