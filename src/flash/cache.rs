//! Fixed-capacity hash+LRU byte-range cache sitting in front of the
//! flash transport. A direct port of `x_cache.c`'s `cache_get`/
//! `cache_put`/`cache_evict` onto a `HashMap` + intrusive-by-key LRU
//! order, since Rust's ownership rules make the original's
//! doubly-linked `cache_entry_t` list awkward without `unsafe`; a
//! `Vec`-backed recency order gives the same eviction behaviour.

use std::collections::HashMap;

type Key = (u32, u32); // (addr, len)

pub struct FlashCache {
    entries: HashMap<Key, Vec<u8>>,
    recency: Vec<Key>, // front = most recently used
    capacity: usize,
    used: usize,
}

impl FlashCache {
    pub fn new(capacity: usize) -> FlashCache {
        FlashCache {
            entries: HashMap::new(),
            recency: Vec::new(),
            capacity,
            used: 0,
        }
    }

    pub fn get(&mut self, addr: u32, len: u32) -> Option<Vec<u8>> {
        let key = (addr, len);
        if self.entries.contains_key(&key) {
            self.touch(key);
            self.entries.get(&key).cloned()
        } else {
            None
        }
    }

    pub fn put(&mut self, addr: u32, len: u32, data: Vec<u8>) {
        let key = (addr, len);
        let size = data.len();
        if size > self.capacity {
            // mirrors X_cache_read's "len bigger than cache size": skip insertion
            return;
        }
        self.evict_to_fit(size);
        self.used += size;
        self.entries.insert(key, data);
        self.recency.insert(0, key);
    }

    fn touch(&mut self, key: Key) {
        if let Some(pos) = self.recency.iter().position(|k| *k == key) {
            let k = self.recency.remove(pos);
            self.recency.insert(0, k);
        }
    }

    fn evict_to_fit(&mut self, needed: usize) {
        while self.used + needed > self.capacity {
            let Some(victim) = self.recency.pop() else {
                break;
            };
            if let Some(data) = self.entries.remove(&victim) {
                self.used -= data.len();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let mut c = FlashCache::new(8);
        c.put(0, 4, vec![1; 4]);
        c.put(4, 4, vec![2; 4]);
        // touching (0,4) makes (4,4) the LRU victim
        assert!(c.get(0, 4).is_some());
        c.put(8, 4, vec![3; 4]);
        assert!(c.get(4, 4).is_none());
        assert!(c.get(0, 4).is_some());
        assert!(c.get(8, 4).is_some());
    }

    #[test]
    fn oversized_entry_is_not_cached() {
        let mut c = FlashCache::new(4);
        c.put(0, 8, vec![0; 8]);
        assert!(c.get(0, 8).is_none());
    }
}
