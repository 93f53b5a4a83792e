//! Bounded cache of compiled selectors, keyed by their raw source text.
//!
//! Compilation is pure (same string, same chain), so caching by the raw
//! string is safe. Capacity is fixed and eviction is least-recently-used.
//! Lookups that miss compile under the lock: a miss is a write, and the cache
//! is shared across worker threads.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::parse::{self, SelectorError};
use crate::types::Selector;

#[derive(Debug)]
struct Entry {
    selector: Arc<Selector>,
    last_used: u64,
}

#[derive(Debug)]
struct Inner {
    map: HashMap<String, Entry>,
    capacity: usize,
    tick: u64,
}

/// Fixed-capacity, LRU-evicting map from selector text to compiled selector.
#[derive(Debug)]
pub struct SelectorCache {
    inner: Mutex<Inner>,
}

impl SelectorCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                capacity: capacity.max(1),
                tick: 0,
            }),
        }
    }

    /// Fetch the compiled form of `text`, compiling on miss.
    ///
    /// Compile failures are returned, not cached: a selector that fails today
    /// is re-attempted next time it is seen.
    ///
    /// # Errors
    ///
    /// Propagates [`SelectorError`] from compilation.
    pub fn get_or_compile(&self, text: &str) -> Result<Arc<Selector>, SelectorError> {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if let Some(entry) = inner.map.get_mut(text) {
            entry.last_used = tick;
            return Ok(Arc::clone(&entry.selector));
        }

        let compiled = Arc::new(parse::compile(text)?);
        if inner.map.len() >= inner.capacity {
            evict_lru(&mut inner.map);
        }
        inner.map.insert(
            text.to_owned(),
            Entry {
                selector: Arc::clone(&compiled),
                last_used: tick,
            },
        );
        Ok(compiled)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict_lru(map: &mut HashMap<String, Entry>) {
    let oldest = map
        .iter()
        .min_by_key(|(_, entry)| entry.last_used)
        .map(|(key, _)| key.clone());
    if let Some(key) = oldest {
        map.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_returns_same_compiled_instance() {
        let cache = SelectorCache::new(10);
        let a = cache.get_or_compile("[text=\"Skip\"]").unwrap();
        let b = cache.get_or_compile("[text=\"Skip\"]").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn compile_failure_not_cached() {
        let cache = SelectorCache::new(10);
        assert!(cache.get_or_compile("").is_err());
        assert!(cache.get_or_compile("[broken").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let cache = SelectorCache::new(2);
        cache.get_or_compile("[a=1]").unwrap();
        cache.get_or_compile("[b=2]").unwrap();
        // Touch [a=1] so [b=2] becomes the eviction victim.
        let a = cache.get_or_compile("[a=1]").unwrap();
        cache.get_or_compile("[c=3]").unwrap();
        assert_eq!(cache.len(), 2);

        let a_again = cache.get_or_compile("[a=1]").unwrap();
        assert!(Arc::ptr_eq(&a, &a_again), "[a=1] should have survived");
    }
}
