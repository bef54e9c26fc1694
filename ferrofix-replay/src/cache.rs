/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Bounded set-associative cache with per-set LRU eviction.
//!
//! Session queries hold an open file mapping each, so the working set is
//! bounded: keys hash to one of `num_sets` sets, each holding at most
//! `set_size` entries ordered most-recently-used first. An insert into a
//! full set drops the least-recently-used entry, closing its mapping.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Set-associative LRU cache keyed by `u64`.
pub struct SetAssociativeCache<V> {
    sets: Vec<Vec<(u64, V)>>,
    set_size: usize,
}

impl<V> SetAssociativeCache<V> {
    /// Creates a cache of `num_sets` sets with `set_size` entries each.
    ///
    /// # Panics
    /// Panics when either dimension is zero; a zero-capacity cache is a
    /// programmer error.
    #[must_use]
    pub fn new(num_sets: usize, set_size: usize) -> Self {
        assert!(num_sets > 0, "cache needs at least one set");
        assert!(set_size > 0, "cache sets need at least one entry");
        Self {
            sets: (0..num_sets).map(|_| Vec::with_capacity(set_size)).collect(),
            set_size,
        }
    }

    fn set_index(&self, key: u64) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.sets.len() as u64) as usize
    }

    /// Returns the cached value for `key`, creating it on miss.
    ///
    /// A hit refreshes the entry to most-recently-used. A miss into a full
    /// set evicts (drops) the least-recently-used entry.
    ///
    /// # Errors
    /// Propagates the creation error on miss; the cache is unchanged.
    pub fn compute_if_absent<E>(
        &mut self,
        key: u64,
        create: impl FnOnce() -> Result<V, E>,
    ) -> Result<&mut V, E> {
        let set_index = self.set_index(key);
        let position = self.sets[set_index]
            .iter()
            .position(|(cached, _)| *cached == key);

        match position {
            Some(position) => {
                let entry = self.sets[set_index].remove(position);
                self.sets[set_index].insert(0, entry);
            }
            None => {
                let value = create()?;
                if self.sets[set_index].len() >= self.set_size {
                    self.sets[set_index].pop();
                }
                self.sets[set_index].insert(0, (key, value));
            }
        }
        Ok(&mut self.sets[set_index][0].1)
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.iter().map(Vec::len).sum()
    }

    /// Checks whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached entry.
    pub fn clear(&mut self) {
        for set in &mut self.sets {
            set.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn ok(value: u32) -> impl FnOnce() -> Result<u32, Infallible> {
        move || Ok(value)
    }

    #[test]
    fn test_miss_creates_and_hit_reuses() {
        let mut cache = SetAssociativeCache::new(4, 2);
        assert_eq!(*cache.compute_if_absent(1, ok(10)).unwrap(), 10);
        // The hit must not re-run the factory.
        assert_eq!(*cache.compute_if_absent(1, ok(99)).unwrap(), 10);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_full_set_evicts_least_recently_used() {
        // One set, two ways: keys compete for the same slots.
        let mut cache = SetAssociativeCache::new(1, 2);
        cache.compute_if_absent(1, ok(1)).unwrap();
        cache.compute_if_absent(2, ok(2)).unwrap();

        // Refresh 1, making 2 the LRU victim.
        cache.compute_if_absent(1, ok(99)).unwrap();
        cache.compute_if_absent(3, ok(3)).unwrap();
        assert_eq!(cache.len(), 2);

        // 2 was evicted: its factory runs again.
        assert_eq!(*cache.compute_if_absent(2, ok(42)).unwrap(), 42);
        // 1 survived the whole time.
        assert_eq!(*cache.compute_if_absent(1, ok(77)).unwrap(), 1);
    }

    #[test]
    fn test_creation_error_leaves_cache_unchanged() {
        let mut cache: SetAssociativeCache<u32> = SetAssociativeCache::new(1, 1);
        let result = cache.compute_if_absent(1, || Err("boom"));
        assert_eq!(result.unwrap_err(), "boom");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_drops_entry() {
        use std::rc::Rc;

        let tracked = Rc::new(());
        let mut cache = SetAssociativeCache::new(1, 1);
        cache
            .compute_if_absent(1, || Ok::<_, Infallible>(Rc::clone(&tracked)))
            .unwrap();
        assert_eq!(Rc::strong_count(&tracked), 2);

        cache
            .compute_if_absent(2, || Ok::<_, Infallible>(Rc::new(())))
            .unwrap();
        // The evicted entry was dropped, releasing its resources.
        assert_eq!(Rc::strong_count(&tracked), 1);
    }
}
