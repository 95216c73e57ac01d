//! LockedMap: a [`Table`] behind a lock chosen by a [`Strategy`].

use crate::error::{LockMode, LockTimeout};
use crate::reentrancy::DebugReentrancy;
use crate::strategy::{Exclusive, ReadWrite, Strategy};
use crate::table::{Actual, Table};
use core::fmt;
use core::hash::BuildHasher;
use std::collections::hash_map::RandomState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Map from `String` keys to shared values, safe to use from many threads
/// at once through `&self`.
///
/// Every operation takes the container's lock, does its work on the inner
/// [`Table`], and releases the lock on every exit path, unwinding included.
/// Which lock is used depends on `L`:
///
/// - [`SyncMap`] (`L = Exclusive`): one mutex; all operations, reads
///   included, are totally ordered.
/// - [`RwMap`] (`L = ReadWrite`): `load`, `contains_key`, `len`,
///   `is_empty`, `snapshot` and `range` take the shared lock and may run in
///   parallel; everything else takes the exclusive lock. `load_or_store` is
///   always a writer, even on a hit.
///
/// Values come back as `Arc<V>`: the exact value that was stored, never a
/// copy, and still valid after the key is overwritten or deleted.
///
/// # Range and reentrancy
///
/// [`range`](Self::range) holds the lock for the whole traversal and calls
/// the visitor under it. The visitor **must not** call any method on the
/// same container: the lock is not reentrant, and doing so deadlocks
/// (debug builds detect it and panic instead). A panic inside the visitor
/// releases the lock before it propagates. When the visitor does need to
/// touch the container, use [`range_snapshot`](Self::range_snapshot),
/// which copies the entries out first and runs the visitor unlocked.
///
/// Moving a `LockedMap` is fine; it is not `Clone`, so threads share one
/// instance by reference or through an `Arc`.
pub struct LockedMap<V, L: Strategy, S = RandomState> {
    lock: L::Lock<Table<V, S>>,
    reentrancy: DebugReentrancy,
}

/// Exclusive-lock container: every operation serializes on one mutex.
pub type SyncMap<V, S = RandomState> = LockedMap<V, Exclusive, S>;

/// Reader/writer-lock container for read-heavy workloads.
pub type RwMap<V, S = RandomState> = LockedMap<V, ReadWrite, S>;

impl<V, L: Strategy> LockedMap<V, L> {
    pub fn new() -> Self {
        Self::from_table(Table::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_table(Table::with_capacity(capacity))
    }
}

impl<V, L: Strategy, S: Default> Default for LockedMap<V, L, S> {
    fn default() -> Self {
        Self::from_table(Table::default())
    }
}

impl<V, L: Strategy, S> From<Table<V, S>> for LockedMap<V, L, S> {
    fn from(table: Table<V, S>) -> Self {
        Self::from_table(table)
    }
}

impl<V, L: Strategy, S> LockedMap<V, L, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_table(Table::with_hasher(hasher))
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self::from_table(Table::with_capacity_and_hasher(capacity, hasher))
    }

    pub fn from_table(table: Table<V, S>) -> Self {
        Self {
            lock: L::new(table),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn into_table(self) -> Table<V, S> {
        L::into_inner(self.lock)
    }

    /// Direct access to the table; `&mut self` proves no other thread holds
    /// the lock.
    pub fn get_mut(&mut self) -> &mut Table<V, S> {
        L::get_mut(&mut self.lock)
    }

    fn read(&self) -> L::Read<'_, Table<V, S>> {
        self.reentrancy.check();
        L::read(&self.lock)
    }

    fn write(&self) -> L::Write<'_, Table<V, S>> {
        self.reentrancy.check();
        L::write(&self.lock)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Calls `visit` for each entry, under the read lock, until it returns
    /// `false`.
    ///
    /// Each key present is visited at most once, in unspecified order. On
    /// [`RwMap`] other readers may run concurrently but no writer can, so
    /// the traversal sees one consistent state; on [`SyncMap`] nothing else
    /// runs. `visit` must not call back into this container; see the
    /// type-level docs.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &Arc<V>) -> bool,
    {
        let _g = self.reentrancy.enter();
        let table = L::read(&self.lock);
        let mut visited = 0usize;
        let mut stopped = false;
        table.range(|k, v| {
            visited += 1;
            stopped = !visit(k, v);
            !stopped
        });
        trace!(visited, stopped_early = stopped, "range finished");
    }

    /// Copies every entry out under one read acquisition.
    pub fn snapshot(&self) -> Vec<(String, Arc<V>)> {
        let table = self.read();
        let entries: Vec<_> = table
            .iter()
            .map(|(k, v)| (k.to_owned(), Arc::clone(v)))
            .collect();
        trace!(entries = entries.len(), "snapshot taken");
        entries
    }

    /// Like [`range`](Self::range), but visits a [`snapshot`](Self::snapshot)
    /// with the lock released, so `visit` may call any method on this
    /// container. Entries changed after the snapshot are seen with their
    /// snapshotted values.
    pub fn range_snapshot<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &Arc<V>) -> bool,
    {
        for (k, v) in self.snapshot() {
            if !visit(&k, &v) {
                break;
            }
        }
    }

    pub fn clear(&self) {
        let old = self.write().take_slots();
        debug!(removed = old.len(), "cleared");
    }

    /// Run `f` with read access, waiting at most `timeout` for the lock.
    pub fn try_read_for<R, F>(&self, timeout: Duration, f: F) -> Result<R, LockTimeout>
    where
        F: FnOnce(&Table<V, S>) -> R,
    {
        let _g = self.reentrancy.enter();
        match L::try_read_for(&self.lock, timeout) {
            Some(table) => Ok(f(&*table)),
            None => Err(timed_out(LockMode::Read, timeout)),
        }
    }

    /// Run `f` with exclusive access, waiting at most `timeout` for the lock.
    pub fn try_write_for<R, F>(&self, timeout: Duration, f: F) -> Result<R, LockTimeout>
    where
        F: FnOnce(&mut Table<V, S>) -> R,
    {
        let _g = self.reentrancy.enter();
        match L::try_write_for(&self.lock, timeout) {
            Some(mut table) => Ok(f(&mut *table)),
            None => Err(timed_out(LockMode::Write, timeout)),
        }
    }
}

fn timed_out(mode: LockMode, waited: Duration) -> LockTimeout {
    debug!(%mode, ?waited, "lock acquisition timed out");
    LockTimeout { mode, waited }
}

// Replaced and removed values (and a rejected compare_and_swap value) are
// bound to a local so that their destructors run after the guard is
// released. `clear` does the same with the whole slot arena.
impl<V, L: Strategy, S: BuildHasher> LockedMap<V, L, S> {
    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn load(&self, key: &str) -> Option<Arc<V>> {
        self.read().load(key).cloned()
    }

    pub fn store(&self, key: impl Into<String>, value: V) {
        let _old = self.write().swap(key, value);
    }

    /// Store `value` and return the value it replaced.
    pub fn swap(&self, key: impl Into<String>, value: V) -> Option<Arc<V>> {
        self.write().swap(key, value)
    }

    pub fn delete(&self, key: &str) {
        let _old = self.write().load_and_delete(key);
    }

    pub fn load_and_delete(&self, key: &str) -> Option<Arc<V>> {
        self.write().load_and_delete(key)
    }

    /// Return the existing value for `key`, or store `value` if absent.
    /// Takes the write lock even when the key turns out to be present.
    pub fn load_or_store(&self, key: impl Into<String>, value: V) -> Actual<V> {
        self.write().load_or_store(key, value)
    }

    /// Like [`load_or_store`](Self::load_or_store); `make` runs under the
    /// write lock and only on a miss.
    pub fn load_or_store_with<F>(&self, key: impl Into<String>, make: F) -> Actual<V>
    where
        F: FnOnce() -> V,
    {
        self.write().load_or_store_with(key, make)
    }

    pub fn compare_and_swap(&self, key: &str, old: &V, new: V) -> bool
    where
        V: PartialEq,
    {
        let swapped = self.write().replace_if_eq(key, old, new);
        swapped.is_ok()
    }

    pub fn compare_and_delete(&self, key: &str, old: &V) -> bool
    where
        V: PartialEq,
    {
        let removed = self.write().remove_if_eq(key, old);
        removed.is_some()
    }

    pub fn try_load_for(&self, key: &str, timeout: Duration) -> Result<Option<Arc<V>>, LockTimeout> {
        self.try_read_for(timeout, |t| t.load(key).cloned())
    }

    pub fn try_store_for(
        &self,
        key: impl Into<String>,
        value: V,
        timeout: Duration,
    ) -> Result<(), LockTimeout> {
        let _old = self.try_write_for(timeout, |t| t.swap(key, value))?;
        Ok(())
    }
}

impl<K, V, L, S> Extend<(K, V)> for LockedMap<V, L, S>
where
    K: Into<String>,
    L: Strategy,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.get_mut().extend(iter);
    }
}

impl<K, V, L, S> FromIterator<(K, V)> for LockedMap<V, L, S>
where
    K: Into<String>,
    L: Strategy,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_table(iter.into_iter().collect())
    }
}

impl<V, L: Strategy, S> fmt::Debug for LockedMap<V, L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never blocks: Debug may run while this thread holds the lock.
        f.debug_struct("LockedMap")
            .field("strategy", &core::any::type_name::<L>())
            .finish_non_exhaustive()
    }
}
