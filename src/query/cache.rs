//! In-process response cache backed by moka

use moka::sync::Cache;
use std::hash::Hash;
use std::time::Duration;
use tracing::debug;

/// Bounded cache whose entries expire after a fixed TTL
///
/// A zero TTL disables caching.
#[derive(Clone)]
pub struct ResponseCache<K, V> {
    inner: Option<Cache<K, V>>,
}

impl<K, V> ResponseCache<K, V>
where
    K: Eq + Hash + std::fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache holding at most `max_capacity` entries for `ttl` each
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let inner = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build()
        });
        Self { inner }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let cache = self.inner.as_ref()?;
        let found = cache.get(key);
        if found.is_some() {
            debug!(key = ?key, "Cache HIT");
        } else {
            debug!(key = ?key, "Cache MISS");
        }
        found
    }

    pub fn insert(&self, key: K, value: V) {
        if let Some(cache) = &self.inner {
            cache.insert(key, value);
        }
    }

    /// Approximate number of live entries
    ///
    /// Evictions are applied lazily; the count settles after pending
    /// maintenance runs.
    pub fn entry_count(&self) -> u64 {
        match &self.inner {
            Some(cache) => {
                cache.run_pending_tasks();
                cache.entry_count()
            }
            None => 0,
        }
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_before_expiry() {
        let cache = ResponseCache::new(Duration::from_secs(10), 100);
        cache.insert("a", 1);

        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = ResponseCache::new(Duration::from_millis(50), 100);
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(120));

        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_capacity_bounds_distinct_keys() {
        let cache = ResponseCache::new(Duration::from_secs(300), 100);
        for i in 0..10_000u32 {
            cache.insert(format!("search-{}", i), i);
        }

        assert!(cache.entry_count() <= 100);
    }

    #[test]
    fn test_clear_drops_everything() {
        let cache = ResponseCache::new(Duration::from_secs(10), 100);
        cache.insert("a", 1);
        cache.clear();

        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let cache = ResponseCache::new(Duration::ZERO, 100);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.entry_count(), 0);
    }
}
