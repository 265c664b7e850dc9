//! In-process route cache in front of the `route_cache` table.

use crate::routing::FetchedRoute;
use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

pub trait CacheEntry {
    fn fetched_at(&self) -> Instant;
}

/// Drop entries older than `max_age`, then the oldest until at most `max_entries` remain.
pub fn prune_cache<K, V>(cache: &DashMap<K, V>, max_entries: usize, max_age: Duration)
where
    K: Clone + Eq + Hash,
    V: CacheEntry,
{
    let now = Instant::now();
    let mut entries: Vec<(K, Instant)> = cache
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().fetched_at()))
        .collect();

    entries.retain(|(key, fetched_at)| {
        if now.duration_since(*fetched_at) > max_age {
            cache.remove(key);
            false
        } else {
            true
        }
    });

    if cache.len() <= max_entries {
        return;
    }

    entries.sort_by_key(|(_, fetched_at)| *fetched_at);
    for (key, _) in entries {
        if cache.len() <= max_entries {
            break;
        }
        cache.remove(&key);
    }
}

#[derive(Debug, Clone)]
pub struct CachedRoute {
    pub route: FetchedRoute,
    fetched_at: Instant,
    max_age: Duration,
}

impl CacheEntry for CachedRoute {
    fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

/// Routes keyed by [`crate::routing::route_cache_key`].
pub struct RouteMemoryCache {
    entries: DashMap<String, CachedRoute>,
    max_entries: usize,
    max_age: Duration,
}

impl RouteMemoryCache {
    pub fn new(max_entries: usize, max_age: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            max_age,
        }
    }

    pub fn get(&self, key: &str) -> Option<FetchedRoute> {
        {
            let entry = self.entries.get(key)?;
            if entry.fetched_at.elapsed() <= entry.max_age {
                return Some(entry.route.clone());
            }
        }
        self.entries.remove(key);
        None
    }

    pub fn insert(&self, key: String, route: FetchedRoute) {
        self.insert_with_remaining(key, route, self.max_age);
    }

    /// Insert a route that already spent part of its lifetime elsewhere.
    /// The entry expires after `remaining`, never later than the cache's own max age.
    pub fn insert_with_remaining(&self, key: String, route: FetchedRoute, remaining: Duration) {
        self.entries.insert(
            key,
            CachedRoute {
                route,
                fetched_at: Instant::now(),
                max_age: remaining.min(self.max_age),
            },
        );
        if self.entries.len() > self.max_entries {
            prune_cache(&self.entries, self.max_entries, self.max_age);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuel_core::RouteGeometry;

    struct Stamp(Instant);

    impl CacheEntry for Stamp {
        fn fetched_at(&self) -> Instant {
            self.0
        }
    }

    fn route(miles: f64) -> FetchedRoute {
        FetchedRoute {
            geometry: RouteGeometry::new(vec![[-100.0, 30.0], [-100.0, 31.0]]),
            total_distance_miles: miles,
        }
    }

    #[test]
    fn prune_evicts_oldest_beyond_capacity() {
        let cache = DashMap::new();
        let base = Instant::now();
        for i in 0..5u64 {
            cache.insert(i, Stamp(base + Duration::from_millis(i)));
        }
        prune_cache(&cache, 3, Duration::from_secs(60));
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains_key(&0));
        assert!(!cache.contains_key(&1));
        assert!(cache.contains_key(&4));
    }

    #[test]
    fn prune_drops_expired_entries() {
        let cache = DashMap::new();
        cache.insert("stale", Stamp(Instant::now()));
        std::thread::sleep(Duration::from_millis(300));
        cache.insert("newer", Stamp(Instant::now()));
        prune_cache(&cache, 10, Duration::from_millis(200));
        assert!(!cache.contains_key("stale"));
        assert!(cache.contains_key("newer"));
    }

    #[test]
    fn memory_cache_round_trip_and_capacity() {
        let cache = RouteMemoryCache::new(2, Duration::from_secs(60));
        for (key, miles) in [("a", 1.0), ("b", 2.0), ("c", 3.0)] {
            cache.insert(key.to_string(), route(miles));
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("c").map(|r| r.total_distance_miles), Some(3.0));
        assert!(cache.get("missing").is_none());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn partly_aged_routes_keep_their_deadline() {
        let cache = RouteMemoryCache::new(8, Duration::from_secs(60));
        cache.insert_with_remaining("aged".into(), route(1.0), Duration::from_millis(50));
        cache.insert_with_remaining("fresh".into(), route(2.0), Duration::from_secs(3600));
        assert!(cache.get("aged").is_some());

        std::thread::sleep(Duration::from_millis(150));
        assert!(cache.get("aged").is_none());
        assert_eq!(cache.get("fresh").map(|r| r.total_distance_miles), Some(2.0));
    }

    #[test]
    fn memory_cache_expires_entries_on_read() {
        let cache = RouteMemoryCache::new(8, Duration::ZERO);
        cache.insert("a".into(), route(1.0));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }
}
