//! Table: unsynchronized string-keyed storage. A hash index points into a
//! slot arena; every slot keeps its precomputed hash so the index never
//! rehashes a key after insertion.

use core::fmt;
use core::hash::BuildHasher;
use hashbrown::hash_table::Entry as IndexEntry;
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct Slot<V> {
    key: String,
    value: Arc<V>,
    hash: u64,
}

/// Result of [`Table::load_or_store`]: the value now associated with the
/// key, and whether it was already there.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Actual<V> {
    /// The key was present; the existing value is returned untouched.
    Loaded(Arc<V>),
    /// The key was absent; the given value was stored and is returned.
    Stored(Arc<V>),
}

impl<V> Actual<V> {
    /// True if the key was present before the call.
    #[inline]
    pub fn loaded(&self) -> bool {
        matches!(self, Actual::Loaded(_))
    }

    #[inline]
    pub fn value(&self) -> &Arc<V> {
        match self {
            Actual::Loaded(v) | Actual::Stored(v) => v,
        }
    }

    #[inline]
    pub fn into_value(self) -> Arc<V> {
        match self {
            Actual::Loaded(v) | Actual::Stored(v) => v,
        }
    }
}

/// Unsynchronized map from `String` keys to shared, immutable values.
///
/// Values are stored as `Arc<V>`: lookups hand out the exact value that was
/// stored without copying `V`, and a later `store` replaces the `Arc`
/// wholesale rather than mutating through it. Mutators take `&mut self`, so
/// a `Table` cannot be shared between threads without an enclosing lock;
/// see [`LockedMap`](crate::LockedMap) for that.
pub struct Table<V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Slot<V>>,
}

impl<V> Table<V> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<V, S: Default> Default for Table<V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

/// Iterator over the entries of a [`Table`], in unspecified order.
pub struct Iter<'a, V> {
    it: slotmap::basic::Iter<'a, DefaultKey, Slot<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a Arc<V>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, s)| (s.key.as_str(), &s.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<V, S> Table<V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::with_capacity(capacity),
            slots: SlotMap::with_capacity_and_key(capacity),
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            it: self.slots.iter(),
        }
    }

    /// Calls `visit` for each entry until it returns `false`.
    ///
    /// Every key present is visited at most once; order is unspecified.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &Arc<V>) -> bool,
    {
        for (key, value) in self.iter() {
            if !visit(key, value) {
                break;
            }
        }
    }

    pub fn clear(&mut self) {
        let _ = self.take_slots();
    }

    /// Empty the table, returning the old slots so their values drop
    /// wherever the caller lets go of them.
    pub(crate) fn take_slots(&mut self) -> SlotMap<DefaultKey, Slot<V>> {
        self.index.clear();
        core::mem::take(&mut self.slots)
    }
}

impl<V, S> Table<V, S>
where
    S: BuildHasher,
{
    fn make_hash(&self, key: &str) -> u64 {
        self.hasher.hash_one(key)
    }

    fn find_slot(&self, key: &str) -> Option<DefaultKey> {
        let hash = self.make_hash(key);
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|s| s.key == key)
                    .unwrap_or(false)
            })
            .copied()
    }

    fn remove_slot(&mut self, key: &str) -> Option<Slot<V>> {
        let hash = self.make_hash(key);
        let found = self.index.find_entry(hash, |&k| {
            self.slots
                .get(k)
                .map(|s| s.key == key)
                .unwrap_or(false)
        });
        match found {
            Ok(occupied) => {
                let (k, _) = occupied.remove();
                self.slots.remove(k)
            }
            Err(_) => None,
        }
    }

    /// Insert or overwrite, returning the value that was replaced.
    fn put(&mut self, key: String, value: Arc<V>) -> Option<Arc<V>> {
        let hash = self.make_hash(&key);
        match self.index.entry(
            hash,
            |&k| self.slots.get(k).map(|s| s.key == key).unwrap_or(false),
            |&k| self.slots.get(k).map(|s| s.hash).unwrap_or(0),
        ) {
            IndexEntry::Occupied(o) => {
                let slot = self
                    .slots
                    .get_mut(*o.get())
                    .expect("indexed slot must be live");
                Some(core::mem::replace(&mut slot.value, value))
            }
            IndexEntry::Vacant(v) => {
                let k = self.slots.insert(Slot { key, value, hash });
                let _ = v.insert(k);
                None
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find_slot(key).is_some()
    }

    /// Borrow the value stored for `key`.
    pub fn load(&self, key: &str) -> Option<&Arc<V>> {
        let k = self.find_slot(key)?;
        self.slots.get(k).map(|s| &s.value)
    }

    /// Insert or unconditionally overwrite the entry for `key`.
    pub fn store(&mut self, key: impl Into<String>, value: V) {
        let _ = self.put(key.into(), Arc::new(value));
    }

    /// Like [`store`](Self::store), returning the previous value if any.
    pub fn swap(&mut self, key: impl Into<String>, value: V) -> Option<Arc<V>> {
        self.put(key.into(), Arc::new(value))
    }

    /// Remove the entry for `key`; absent keys are a no-op.
    pub fn delete(&mut self, key: &str) {
        let _ = self.remove_slot(key);
    }

    /// Remove the entry for `key` and return its value.
    pub fn load_and_delete(&mut self, key: &str) -> Option<Arc<V>> {
        self.remove_slot(key).map(|s| s.value)
    }

    /// Return the existing value for `key`, or store `value` if absent.
    /// An existing value is never overwritten.
    pub fn load_or_store(&mut self, key: impl Into<String>, value: V) -> Actual<V> {
        self.load_or_store_with(key, || value)
    }

    /// Like [`load_or_store`](Self::load_or_store), but only builds the
    /// value when the key is absent.
    pub fn load_or_store_with<F>(&mut self, key: impl Into<String>, make: F) -> Actual<V>
    where
        F: FnOnce() -> V,
    {
        let key = key.into();
        let hash = self.make_hash(&key);
        match self.index.entry(
            hash,
            |&k| self.slots.get(k).map(|s| s.key == key).unwrap_or(false),
            |&k| self.slots.get(k).map(|s| s.hash).unwrap_or(0),
        ) {
            IndexEntry::Occupied(o) => {
                let slot = self.slots.get(*o.get()).expect("indexed slot must be live");
                Actual::Loaded(slot.value.clone())
            }
            IndexEntry::Vacant(v) => {
                let value = Arc::new(make());
                let k = self.slots.insert(Slot {
                    key,
                    value: value.clone(),
                    hash,
                });
                let _ = v.insert(k);
                Actual::Stored(value)
            }
        }
    }

    /// Replace the value for `key` with `new` only if it currently equals
    /// `old`. Returns whether the swap happened.
    pub fn compare_and_swap(&mut self, key: &str, old: &V, new: V) -> bool
    where
        V: PartialEq,
    {
        self.replace_if_eq(key, old, new).is_ok()
    }

    /// Delete the entry for `key` only if its value equals `old`.
    pub fn compare_and_delete(&mut self, key: &str, old: &V) -> bool
    where
        V: PartialEq,
    {
        self.remove_if_eq(key, old).is_some()
    }

    /// `compare_and_swap` handing back the replaced value on success, or
    /// `new` untouched on a mismatch, so the caller picks where either drops.
    pub(crate) fn replace_if_eq(&mut self, key: &str, old: &V, new: V) -> Result<Arc<V>, V>
    where
        V: PartialEq,
    {
        match self.find_slot(key).and_then(|k| self.slots.get_mut(k)) {
            Some(slot) if *slot.value == *old => {
                Ok(core::mem::replace(&mut slot.value, Arc::new(new)))
            }
            _ => Err(new),
        }
    }

    /// `compare_and_delete` handing back the removed value.
    pub(crate) fn remove_if_eq(&mut self, key: &str, old: &V) -> Option<Arc<V>>
    where
        V: PartialEq,
    {
        if self.load(key).is_some_and(|v| **v == *old) {
            self.load_and_delete(key)
        } else {
            None
        }
    }
}

impl<'a, V, S> IntoIterator for &'a Table<V, S> {
    type Item = (&'a str, &'a Arc<V>);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> Extend<(K, V)> for Table<V, S>
where
    K: Into<String>,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.store(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for Table<V, S>
where
    K: Into<String>,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut t = Self::default();
        t.extend(iter);
        t
    }
}

impl<V: fmt::Debug, S> fmt::Debug for Table<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
