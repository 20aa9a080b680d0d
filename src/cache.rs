//! Keyed get-or-compute cache.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// A map filled lazily on first access.
///
/// Failed computations are not stored, so an error for one key leaves the
/// cache untouched and a later call may retry.
#[derive(Debug)]
pub struct LazyCache<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for LazyCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> LazyCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.get(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<&V, E> {
        use std::collections::hash_map::Entry;
        match self.entries.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(compute()?)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry, handing them to the caller for release.
    pub fn drain(&mut self) -> impl Iterator<Item = (K, V)> + '_ {
        self.entries.drain()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
