use schnellru::{ByLength, LruMap};
use std::hash::Hash;

/// Fixed-capacity least-recently-used map.
///
/// Eviction is driven by capacity only, there is no time-based expiry.
pub struct LruCache<K, V> {
    capacity: usize,
    entries: LruMap<K, V, ByLength>,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    /// Default capacity.
    pub const DEFAULT_CAPACITY: usize = 4096;

    /// Creates an empty cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let limit = u32::try_from(capacity).unwrap_or(u32::MAX);
        Self {
            capacity: limit as usize,
            entries: LruMap::new(ByLength::new(limit)),
        }
    }

    /// Returns the value for `key` and marks it as most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|value| &*value)
    }

    /// Inserts or overwrites `key`, marks it as most recently used and evicts the least
    /// recently used entry beyond capacity.
    pub fn set(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// Removes `key` if present.
    pub fn delete(&mut self, key: &K) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<K: Hash + Eq, V> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set() {
        let mut cache = LruCache::default();
        assert_eq!(cache.get(&"a"), None);

        cache.set("a", 1);
        assert_eq!(cache.get(&"a"), Some(&1));

        cache.set("a", 2);
        assert_eq!(cache.get(&"a"), Some(&2));
        assert_eq!(cache.len(), 1);

        cache.delete(&"a");
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = LruCache::new(3);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);
        cache.set("d", 4);

        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
        assert_eq!(cache.get(&"d"), Some(&4));
    }

    #[test]
    fn get_promotes_recency() {
        let mut cache = LruCache::new(3);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);
        cache.get(&"a");
        cache.set("d", 4);

        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"c"), Some(&3));
        assert_eq!(cache.get(&"d"), Some(&4));
    }

    #[test]
    fn overwrite_promotes_recency() {
        let mut cache = LruCache::new(2);
        cache.set(1u32, "one");
        cache.set(2, "two");
        cache.set(1, "uno");
        cache.set(3, "three");

        assert_eq!(cache.get(&1), Some(&"uno"));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.len(), cache.capacity());
    }

    #[test]
    fn byte_keys() {
        let mut cache = LruCache::new(16);
        cache.set(b"key1".to_vec(), 100);
        cache.set(b"key2".to_vec(), 200);
        assert_eq!(cache.get(&b"key1".to_vec()), Some(&100));
        assert_eq!(cache.get(&b"key2".to_vec()), Some(&200));
    }

    #[test]
    fn full_cache_stays_bounded() {
        let capacity = 256 * 1024;
        let mut cache = LruCache::new(capacity);
        for key in 0..capacity as u64 {
            cache.set(key, key);
        }
        assert_eq!(cache.len(), capacity);

        let started = std::time::Instant::now();
        for key in capacity as u64..capacity as u64 + 100_000 {
            cache.set(key, key);
            assert_eq!(cache.get(&key), Some(&key));
            cache.delete(&(key - 1));
        }
        assert!(cache.len() <= capacity);
        assert_eq!(cache.get(&0), None);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
