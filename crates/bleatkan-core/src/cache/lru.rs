//! Fixed-capacity LRU keyed by state id.
//!
//! Tiers hold at most a handful of entries, so a deque scan beats hashing.

use std::collections::VecDeque;

/// Least recently used entry at the front, most recent at the back.
#[derive(Debug)]
pub(crate) struct LruTier<V> {
    capacity: usize,
    entries: VecDeque<(String, V)>,
}

impl<V> LruTier<V> {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Look up `key`, moving it to most-recent when `promote` is set.
    pub(crate) fn get(&mut self, key: &str, promote: bool) -> Option<&V> {
        let index = self.position(key)?;
        if promote {
            let entry = self.entries.remove(index)?;
            self.entries.push_back(entry);
            self.entries.back().map(|(_, v)| v)
        } else {
            self.entries.get(index).map(|(_, v)| v)
        }
    }

    /// Insert as most-recent, replacing any existing value for `key` and
    /// evicting the least recent entry if full. Returns the evicted key.
    pub(crate) fn insert(&mut self, key: impl Into<String>, value: V) -> Option<String> {
        let key = key.into();
        if let Some(index) = self.position(&key) {
            self.entries.remove(index);
        }
        let evicted = if self.is_full() {
            self.entries.pop_front().map(|(k, _)| k)
        } else {
            None
        };
        self.entries.push_back((key, value));
        evicted
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<V> {
        let index = self.position(key)?;
        self.entries.remove(index).map(|(_, v)| v)
    }

    pub(crate) fn retain_keys(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|(k, _)| keep(k));
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keys from least to most recent.
    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<V>(tier: &LruTier<V>) -> Vec<&str> {
        tier.keys().collect()
    }

    #[test]
    fn test_evicts_least_recent() {
        let mut tier = LruTier::new(2);
        assert_eq!(tier.insert("a", 1), None);
        assert_eq!(tier.insert("b", 2), None);
        assert!(tier.is_full());
        assert_eq!(tier.insert("c", 3), Some("a".to_string()));
        assert_eq!(keys(&tier), ["b", "c"]);
    }

    #[test]
    fn test_get_promotes_only_when_asked() {
        let mut tier = LruTier::new(3);
        tier.insert("a", 1);
        tier.insert("b", 2);
        tier.insert("c", 3);

        assert_eq!(tier.get("a", false), Some(&1));
        assert_eq!(keys(&tier), ["a", "b", "c"]);

        assert_eq!(tier.get("a", true), Some(&1));
        assert_eq!(keys(&tier), ["b", "c", "a"]);
        assert_eq!(tier.get("zz", true), None);
    }

    #[test]
    fn test_reinsert_replaces_without_eviction() {
        let mut tier = LruTier::new(2);
        tier.insert("a", 1);
        tier.insert("b", 2);
        assert_eq!(tier.insert("a", 10), None);
        assert_eq!(keys(&tier), ["b", "a"]);
        assert_eq!(tier.get("a", false), Some(&10));
        assert_eq!(tier.len(), 2);
    }

    #[test]
    fn test_remove_and_retain() {
        let mut tier = LruTier::new(4);
        for (i, k) in ["a", "b", "c", "d"].iter().enumerate() {
            tier.insert(*k, i);
        }
        assert_eq!(tier.remove("b"), Some(1));
        assert!(!tier.contains("b"));
        tier.retain_keys(|k| k != "c");
        assert_eq!(keys(&tier), ["a", "d"]);
        tier.clear();
        assert_eq!(tier.len(), 0);
        assert_eq!(tier.capacity(), 4);
    }
}
