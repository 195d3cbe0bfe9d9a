//! Bounded LRU cache of contiguous sample slices.
//!
//! Concrete providers read whole chunks of a column at a time and keep the
//! most recently used chunks resident, so the per-sample walk the resampler
//! does rarely touches the backing storage.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Default number of resident slices, matching the per-source cache size the
/// gridded reader has always used.
pub(crate) const DEFAULT_SLICE_CAPACITY: usize = 20;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub(crate) struct SliceKey {
    pub entity_id: String,
    pub variable: String,
    pub start_index: usize,
}

pub(crate) struct SliceCache {
    capacity: usize,
    slices: HashMap<SliceKey, Arc<Vec<f64>>>,
    order: VecDeque<SliceKey>,
}

impl SliceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slices: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn get(&mut self, key: &SliceKey) -> Option<Arc<Vec<f64>>> {
        let slice = self.slices.get(key)?;
        let slice = Arc::clone(slice);
        self.touch(key);
        Some(slice)
    }

    pub fn insert(&mut self, key: SliceKey, values: Arc<Vec<f64>>) {
        if self.slices.insert(key.clone(), values).is_some() {
            self.touch(&key);
        } else {
            self.order.push_back(key);
        }
        while self.slices.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.slices.remove(&evicted);
            }
        }
    }

    #[cfg(test)]
    pub fn contains(&self, key: &SliceKey) -> bool {
        self.slices.contains_key(key)
    }

    fn touch(&mut self, key: &SliceKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
            self.order.push_back(key.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(variable: &str, start_index: usize) -> SliceKey {
        SliceKey {
            entity_id: String::new(),
            variable: variable.to_string(),
            start_index,
        }
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = SliceCache::new(2);
        cache.insert(key("a", 0), Arc::new(vec![1.0]));
        cache.insert(key("b", 0), Arc::new(vec![2.0]));
        cache.insert(key("c", 0), Arc::new(vec![3.0]));
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&key("a", 0)));
        assert!(cache.contains(&key("b", 0)));
        assert!(cache.contains(&key("c", 0)));
    }

    #[test]
    fn get_refreshes_recency() {
        let mut cache = SliceCache::new(2);
        cache.insert(key("a", 0), Arc::new(vec![1.0]));
        cache.insert(key("b", 0), Arc::new(vec![2.0]));
        assert!(cache.get(&key("a", 0)).is_some());
        cache.insert(key("c", 0), Arc::new(vec![3.0]));
        // "b" was the stalest entry once "a" was touched.
        assert!(cache.contains(&key("a", 0)));
        assert!(!cache.contains(&key("b", 0)));
    }

    #[test]
    fn reinsert_replaces_without_growth() {
        let mut cache = SliceCache::new(2);
        cache.insert(key("a", 0), Arc::new(vec![1.0]));
        cache.insert(key("a", 0), Arc::new(vec![9.0]));
        assert_eq!(cache.len(), 1);
        assert_eq!(*cache.get(&key("a", 0)).unwrap(), vec![9.0]);
    }
}
