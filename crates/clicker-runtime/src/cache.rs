use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Clone, Debug)]
struct Entry<V> {
    at: DateTime<Utc>,
    value: V,
}

/// Small time- and size-bounded result cache.
///
/// A lookup hits only while the entry is younger than `freshness`. Entries
/// older than `retention` are dropped on every access, and when more than
/// `capacity` remain the oldest go first.
#[derive(Clone, Debug)]
pub struct WindowedCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    freshness: Duration,
    retention: Duration,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> WindowedCache<K, V> {
    /// Empty cache with the given windows and size bound.
    pub fn new(freshness: Duration, retention: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            freshness,
            retention,
            capacity,
        }
    }

    /// Value stored under `key` if it was inserted less than `freshness` ago.
    pub fn get_fresh(&mut self, key: &K, now: DateTime<Utc>) -> Option<V> {
        self.purge(now);
        let e = self.entries.get(key)?;
        let age = now.signed_duration_since(e.at);
        if age >= Duration::zero() && age < self.freshness {
            Some(e.value.clone())
        } else {
            None
        }
    }

    /// Store `value` stamped with `now`, replacing any previous entry.
    pub fn insert(&mut self, key: K, value: V, now: DateTime<Utc>) {
        self.entries.insert(key, Entry { at: now, value });
        self.purge(now);
    }

    /// Drop expired entries, then trim to capacity oldest-first.
    pub fn purge(&mut self, now: DateTime<Utc>) {
        let retention = self.retention;
        self.entries
            .retain(|_, e| now.signed_duration_since(e.at) <= retention);
        if self.entries.len() <= self.capacity {
            return;
        }
        let mut by_age: Vec<(DateTime<Utc>, K)> =
            self.entries.iter().map(|(k, e)| (e.at, k.clone())).collect();
        by_age.sort_by_key(|(at, _)| *at);
        let excess = self.entries.len() - self.capacity;
        for (_, k) in by_age.into_iter().take(excess) {
            self.entries.remove(&k);
        }
    }

    /// Entries currently retained, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn cache(capacity: usize) -> WindowedCache<u32, &'static str> {
        WindowedCache::new(Duration::seconds(2), Duration::seconds(30), capacity)
    }

    #[test]
    fn hit_only_inside_freshness_window() {
        let mut c = cache(10);
        c.insert(1, "a", t0());
        assert_eq!(c.get_fresh(&1, t0() + Duration::milliseconds(1_999)), Some("a"));
        assert_eq!(c.get_fresh(&1, t0() + Duration::seconds(2)), None);
        // stale but still retained
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn retention_evicts() {
        let mut c = cache(10);
        c.insert(1, "a", t0());
        c.insert(2, "b", t0() + Duration::seconds(20));
        c.purge(t0() + Duration::seconds(31));
        assert_eq!(c.len(), 1);
        assert_eq!(c.get_fresh(&2, t0() + Duration::seconds(21)), Some("b"));
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut c = cache(2);
        c.insert(1, "a", t0());
        c.insert(2, "b", t0() + Duration::milliseconds(10));
        c.insert(3, "c", t0() + Duration::milliseconds(20));
        assert_eq!(c.len(), 2);
        let now = t0() + Duration::milliseconds(30);
        assert_eq!(c.get_fresh(&1, now), None);
        assert_eq!(c.get_fresh(&2, now), Some("b"));
        assert_eq!(c.get_fresh(&3, now), Some("c"));
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(cap in 1usize..20, keys in proptest::collection::vec(0u32..50, 0..200)) {
            let mut c = cache(cap);
            for (i, k) in keys.into_iter().enumerate() {
                c.insert(k, "x", t0() + Duration::milliseconds(i as i64));
                prop_assert!(c.len() <= cap);
            }
        }
    }
}
