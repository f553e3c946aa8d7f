//! Dedup gate (§4.6 step 6): an ordered, TTL-bounded, capacity-bounded
//! in-memory map of recently-seen idempotency keys.
//!
//! `seq` numbers double as the insertion-order key, a HashMap-plus-
//! ordered-index shape that carries an eviction order a `HashMap` alone
//! can't give us.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

struct Entry {
    inserted_at: Instant,
    seq: u64,
}

struct Inner {
    entries: HashMap<String, Entry>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

/// TTL + LRU-by-insertion dedup table guarding the bus's write-ahead log
/// from duplicate `Publish` calls.
pub struct DedupMap {
    ttl: Duration,
    capacity: usize,
    inner: Mutex<Inner>,
}

impl DedupMap {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
        }
    }

    /// Returns `true` if `idem` is new (or its prior sighting has expired),
    /// in which case it is recorded as seen now. Returns `false` if `idem`
    /// was already seen within the TTL window — the caller should treat
    /// this as an idempotent-retry `OK` without persisting again.
    pub fn check_and_insert(&self, idem: &str) -> bool {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if let Some(existing) = inner.entries.get(idem) {
            if now.duration_since(existing.inserted_at) <= self.ttl {
                return false;
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;

        if let Some(old) = inner.entries.insert(idem.to_string(), Entry { inserted_at: now, seq }) {
            inner.order.remove(&old.seq);
        }
        inner.order.insert(seq, idem.to_string());

        while inner.entries.len() > self.capacity {
            let Some((&oldest_seq, _)) = inner.order.iter().next() else {
                break;
            };
            if let Some(key) = inner.order.remove(&oldest_seq) {
                inner.entries.remove(&key);
            }
        }

        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_new() {
        let map = DedupMap::new(Duration::from_secs(60), 100);
        assert!(map.check_and_insert("a"));
    }

    #[test]
    fn second_sighting_within_ttl_is_duplicate() {
        let map = DedupMap::new(Duration::from_secs(60), 100);
        assert!(map.check_and_insert("a"));
        assert!(!map.check_and_insert("a"));
    }

    #[test]
    fn sighting_after_ttl_expiry_is_new_again() {
        let map = DedupMap::new(Duration::from_millis(10), 100);
        assert!(map.check_and_insert("a"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(map.check_and_insert("a"));
    }

    #[test]
    fn capacity_evicts_oldest_insertion() {
        let map = DedupMap::new(Duration::from_secs(60), 2);
        map.check_and_insert("a");
        map.check_and_insert("b");
        map.check_and_insert("c");
        assert_eq!(map.len(), 2);
        // "a" was evicted, so it is seen as new again.
        assert!(map.check_and_insert("a"));
    }
}
