use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Bounded first-seen filter. A key admitted once stays blocked for the
/// full TTL from its first sighting; repeat sightings do not extend the
/// window, so a hash re-broadcast by peers is re-admitted at a predictable
/// time instead of being suppressed forever.
pub struct DedupeCache<K> {
    ttl_ms: u64,
    cache: LruCache<K, u64>,
}

impl<K> DedupeCache<K>
where
    K: Hash + Eq,
{
    pub fn new(capacity: usize, ttl_ms: u64) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            ttl_ms,
            cache: LruCache::new(capacity),
        }
    }

    /// Returns true when the key is new (or its window has lapsed) and the
    /// caller should process it.
    pub fn admit(&mut self, key: K, now_ms: u64) -> bool {
        if let Some(first_seen) = self.cache.get(&key) {
            if now_ms.saturating_sub(*first_seen) <= self.ttl_ms {
                return false;
            }
        }
        self.cache.put(key, now_ms);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::DedupeCache;

    #[test]
    fn blocks_repeat_within_ttl() {
        let mut cache = DedupeCache::new(4, 100);
        assert!(cache.admit(42u64, 1_000));
        assert!(!cache.admit(42u64, 1_050));
    }

    #[test]
    fn readmits_after_ttl() {
        let mut cache = DedupeCache::new(4, 100);
        assert!(cache.admit(7u64, 1_000));
        assert!(cache.admit(7u64, 1_200));
    }

    #[test]
    fn repeat_sightings_do_not_extend_window() {
        let mut cache = DedupeCache::new(4, 100);
        assert!(cache.admit(9u64, 1_000));
        assert!(!cache.admit(9u64, 1_090));
        // 110ms after first sighting: window lapsed despite the hit at 1_090
        assert!(cache.admit(9u64, 1_110));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut cache = DedupeCache::new(2, 10_000);
        assert!(cache.admit(1u64, 1_000));
        assert!(cache.admit(2u64, 1_001));
        assert!(cache.admit(3u64, 1_002));
        // key 1 was evicted by capacity, so it is admitted again
        assert!(cache.admit(1u64, 1_003));
    }
}
