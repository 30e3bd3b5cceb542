//! Bidirectional tag index.
//!
//! Tracks tag → keys and key → tags so that invalidating a tag finds every
//! dependent entry, and removing an entry for any reason (expiry, eviction,
//! explicit delete) leaves no dangling tag references behind.
//!
//! The index is not synchronised on its own; it lives inside the store's lock
//! so entries and tags always change together.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::keys::{CacheKey, Tag};

#[derive(Debug, Default)]
pub struct TagIndex {
    tag_to_keys: HashMap<Tag, HashSet<CacheKey>>,
    key_to_tags: HashMap<CacheKey, BTreeSet<Tag>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tags of a freshly written entry, replacing any previous set.
    pub fn register(&mut self, key: &CacheKey, tags: BTreeSet<Tag>) {
        self.unregister(key);
        if tags.is_empty() {
            return;
        }
        for tag in &tags {
            self.tag_to_keys
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        self.key_to_tags.insert(key.clone(), tags);
    }

    /// Forget a key. Called whenever its entry leaves the store.
    pub fn unregister(&mut self, key: &CacheKey) {
        let Some(tags) = self.key_to_tags.remove(key) else {
            return;
        };
        for tag in tags {
            if let Some(keys) = self.tag_to_keys.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_to_keys.remove(&tag);
                }
            }
        }
    }

    pub fn keys_for_tag(&self, tag: &Tag) -> Vec<CacheKey> {
        self.tag_to_keys
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn tags_for_key(&self, key: &CacheKey) -> BTreeSet<Tag> {
        self.key_to_tags.get(key).cloned().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.tag_to_keys.clear();
        self.key_to_tags.clear();
    }

    pub fn tag_count(&self) -> usize {
        self.tag_to_keys.len()
    }

    pub fn key_count(&self) -> usize {
        self.key_to_tags.len()
    }
}
