//! Point-Lookup Response Cache
//!
//! Optional read-through cache in front of the user and location point
//! lookups, keyed by the request path and holding fully rendered responses.
//! The store never changes after finalize, so a cached response can never go
//! stale; the cache exists purely to shortcut re-rendering hot entities.
//! Correctness must never depend on it being enabled.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One response cache: a mutex-guarded map from request path to the complete
/// response bytes. Racing misses are resolved first-writer-wins; the losing
/// writer's bytes are identical anyway.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<HashMap<Box<[u8]>, Arc<[u8]>>>,
}

impl ResponseCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<Arc<[u8]>> {
        self.entries.lock().get(key).cloned()
    }

    /// Insert unless a racing writer got there first.
    pub fn insert_if_absent(&self, key: &[u8], response: &[u8]) {
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) {
            entries.insert(key.into(), response.into());
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// The two caches the service fronts its point lookups with. Capacity hints
/// follow the observed distinct-key counts of the two dataset sizings.
#[derive(Debug)]
pub struct PointCaches {
    pub users: ResponseCache,
    pub locations: ResponseCache,
}

impl PointCaches {
    pub fn with_sizing(full_dataset: bool) -> Self {
        let (users, locations) = if full_dataset {
            (30_044, 29_775)
        } else {
            (1_782, 1_846)
        };
        Self {
            users: ResponseCache::with_capacity(users),
            locations: ResponseCache::with_capacity(locations),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit_returns_identical_bytes() {
        let cache = ResponseCache::with_capacity(4);
        assert!(cache.get(b"/users/1").is_none());
        cache.insert_if_absent(b"/users/1", b"response-bytes");
        assert_eq!(&*cache.get(b"/users/1").unwrap(), b"response-bytes");
    }

    #[test]
    fn first_writer_wins_on_racing_inserts() {
        let cache = ResponseCache::with_capacity(4);
        cache.insert_if_absent(b"/users/1", b"first");
        cache.insert_if_absent(b"/users/1", b"second");
        assert_eq!(&*cache.get(b"/users/1").unwrap(), b"first");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys_are_per_path() {
        let cache = ResponseCache::with_capacity(4);
        cache.insert_if_absent(b"/users/1", b"one");
        cache.insert_if_absent(b"/users/2", b"two");
        assert_eq!(&*cache.get(b"/users/2").unwrap(), b"two");
        assert_eq!(cache.len(), 2);
    }
}
