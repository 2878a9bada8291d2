//! TRIDENT - Block Cache
//! Fixed-capacity, access-order eviction cache for decoded SSTable blocks.

use std::collections::HashMap;
use std::hash::Hash;

/// Bounded LRU cache: a hit bumps the entry to most-recently-used, and an
/// insert past capacity evicts the least-recently-used entry.
///
/// Not internally synchronized; the owning SSTable serializes access.
#[derive(Debug)]
pub struct BlockCache<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    /// Keys ordered least- to most-recently-used.
    order: Vec<K>,
}

impl<K: Eq + Hash + Clone, V> BlockCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity + 1),
            order: Vec::with_capacity(capacity + 1),
        }
    }

    /// Look up a cached value, bumping it to most-recently-used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.touch(key);
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a value, evicting the eldest entry when over capacity.
    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key.clone(), value).is_some() {
            self.touch(&key);
        } else {
            self.order.push(key);
        }
        while self.entries.len() > self.capacity {
            let eldest = self.order.remove(0);
            self.entries.remove(&eldest);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos);
            self.order.push(k);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut cache = BlockCache::new(2);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"missing"), None);
    }

    #[test]
    fn test_eviction_order() {
        let mut cache = BlockCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        assert!(!cache.contains(&"a")); // eldest evicted
        assert!(cache.contains(&"b"));
        assert!(cache.contains(&"c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_access_bumps_recency() {
        let mut cache = BlockCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);

        // Touch "a" so "b" becomes the eldest.
        cache.get(&"a");
        cache.insert("c", 3);

        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"c"));
    }

    #[test]
    fn test_reinsert_replaces_value() {
        let mut cache = BlockCache::new(2);
        cache.insert("a", 1);
        cache.insert("a", 9);
        assert_eq!(cache.get(&"a"), Some(&9));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_capacity_caches_nothing() {
        let mut cache = BlockCache::new(0);
        cache.insert("a", 1);
        assert!(cache.is_empty());
    }
}
