use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::domain::{MediaId, TrackedItem};

/// Ids of items that still need a metadata fetch, in collection order.
pub fn missing_metadata_ids(items: &[TrackedItem]) -> Vec<MediaId> {
    items
        .iter()
        .filter(|item| !item.has_complete_metadata())
        .map(|item| item.id)
        .collect()
}

/// Backlog of ids awaiting a fetch. Duplicates are allowed; merging is idempotent.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    items: VecDeque<MediaId>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = MediaId>) -> Self {
        Self {
            items: ids.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn front(&self) -> Option<MediaId> {
        self.items.front().copied()
    }

    pub fn contains(&self, id: MediaId) -> bool {
        self.items.contains(&id)
    }

    pub fn pop_front(&mut self) -> Option<MediaId> {
        self.items.pop_front()
    }

    /// Re-inserts an id so it is serviced next.
    pub fn push_front(&mut self, id: MediaId) {
        self.items.push_front(id);
    }

    /// Prepends every id not already queued, keeping their relative order.
    /// Returns how many ids were added.
    pub fn prepend_new(&mut self, ids: &[MediaId]) -> usize {
        let queued: HashSet<MediaId> = self.items.iter().copied().collect();
        let mut seen = HashSet::new();
        let fresh: Vec<MediaId> = ids
            .iter()
            .copied()
            .filter(|id| !queued.contains(id) && seen.insert(*id))
            .collect();
        for id in fresh.iter().rev() {
            self.items.push_front(*id);
        }
        fresh.len()
    }

    /// Drops every occurrence of `id`. Returns the number removed.
    pub fn remove_all(&mut self, id: MediaId) -> usize {
        let before = self.items.len();
        self.items.retain(|queued| *queued != id);
        before - self.items.len()
    }

    pub fn replace(&mut self, ids: impl IntoIterator<Item = MediaId>) {
        self.items = ids.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = MediaId> + '_ {
        self.items.iter().copied()
    }
}

/// Ids the remote service reported as having no match. Persisted by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnresolvedSet {
    ids: BTreeSet<MediaId>,
}

impl UnresolvedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: MediaId) -> bool {
        self.ids.contains(&id)
    }

    /// Returns `true` when the set changed.
    pub fn insert(&mut self, id: MediaId) -> bool {
        self.ids.insert(id)
    }

    /// Returns `true` when the set changed.
    pub fn remove(&mut self, id: MediaId) -> bool {
        self.ids.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = MediaId> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<MediaId> for UnresolvedSet {
    fn from_iter<T: IntoIterator<Item = MediaId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MediaStatus;

    fn ids(values: &[u64]) -> Vec<MediaId> {
        values.iter().copied().map(MediaId::new).collect()
    }

    #[test]
    fn prepend_new_skips_queued_and_keeps_order() {
        let mut queue = PendingQueue::from_ids(ids(&[3, 4]));
        let added = queue.prepend_new(&ids(&[1, 3, 2, 1]));
        assert_eq!(added, 2);
        assert_eq!(queue.iter().collect::<Vec<_>>(), ids(&[1, 2, 3, 4]));
    }

    #[test]
    fn remove_all_drops_duplicates() {
        let mut queue = PendingQueue::from_ids(ids(&[1, 2, 1, 3]));
        assert_eq!(queue.remove_all(MediaId::new(1)), 2);
        assert_eq!(queue.iter().collect::<Vec<_>>(), ids(&[2, 3]));
    }

    #[test]
    fn missing_metadata_filter_preserves_collection_order() {
        let mut complete = TrackedItem::new(MediaId::new(2), "two");
        complete.description = Some("done".to_string());
        complete.media_status = Some(MediaStatus::Finished);
        let items = vec![
            TrackedItem::new(MediaId::new(5), "five"),
            complete,
            TrackedItem::new(MediaId::new(1), "one"),
        ];
        assert_eq!(missing_metadata_ids(&items), ids(&[5, 1]));
    }

    #[test]
    fn unresolved_set_round_trips_as_json_array() {
        let set: UnresolvedSet = ids(&[7, 3]).into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[3,7]");
    }
}
