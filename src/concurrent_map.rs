//! The capability set shared by every container, so callers can depend on
//! the operations rather than on a locking strategy.

use crate::locked_map::LockedMap;
use crate::strategy::Strategy;
use crate::table::Actual;
use core::hash::BuildHasher;
use std::sync::Arc;

/// String-keyed map usable through `&self` from many threads.
///
/// Implemented by [`SyncMap`](crate::SyncMap) and [`RwMap`](crate::RwMap)
/// with identical semantics; they differ only in which operations may run
/// in parallel.
pub trait ConcurrentMap<V> {
    /// The value stored for `key`, if any. Never mutates.
    fn load(&self, key: &str) -> Option<Arc<V>>;

    /// Insert or unconditionally overwrite the entry for `key`.
    fn store(&self, key: impl Into<String>, value: V);

    /// Remove the entry for `key` and return its value.
    fn load_and_delete(&self, key: &str) -> Option<Arc<V>>;

    /// Remove the entry for `key`; a no-op if absent.
    fn delete(&self, key: &str);

    /// The existing value for `key`, or `value` after storing it. An
    /// existing value is never overwritten.
    fn load_or_store(&self, key: impl Into<String>, value: V) -> Actual<V>;

    /// Call `visit` for each entry until it returns `false`. Each key is
    /// visited at most once, in unspecified order. `visit` must not call
    /// back into the same map.
    fn range<F>(&self, visit: F)
    where
        F: FnMut(&str, &Arc<V>) -> bool;
}

impl<V, L, S> ConcurrentMap<V> for LockedMap<V, L, S>
where
    L: Strategy,
    S: BuildHasher,
{
    #[inline]
    fn load(&self, key: &str) -> Option<Arc<V>> {
        LockedMap::load(self, key)
    }

    #[inline]
    fn store(&self, key: impl Into<String>, value: V) {
        LockedMap::store(self, key, value)
    }

    #[inline]
    fn load_and_delete(&self, key: &str) -> Option<Arc<V>> {
        LockedMap::load_and_delete(self, key)
    }

    #[inline]
    fn delete(&self, key: &str) {
        LockedMap::delete(self, key)
    }

    #[inline]
    fn load_or_store(&self, key: impl Into<String>, value: V) -> Actual<V> {
        LockedMap::load_or_store(self, key, value)
    }

    #[inline]
    fn range<F>(&self, visit: F)
    where
        F: FnMut(&str, &Arc<V>) -> bool,
    {
        LockedMap::range(self, visit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RwMap, SyncMap};

    fn exercise<M: ConcurrentMap<u32>>(m: &M) {
        m.store("a", 1);
        m.store("b", 2);
        m.store("c", 3);
        m.store("a", 4);
        assert_eq!(m.load("a").as_deref(), Some(&4));

        let mut seen = Vec::new();
        m.range(|k, v| {
            seen.push((k.to_string(), **v));
            true
        });
        seen.sort();
        let expected: Vec<(String, u32)> = vec![
            ("a".to_string(), 4),
            ("b".to_string(), 2),
            ("c".to_string(), 3),
        ];
        assert_eq!(seen, expected);

        assert!(m.load_or_store("b", 20).loaded());
        assert_eq!(m.load_and_delete("b").as_deref(), Some(&2));
        m.delete("c");
        m.delete("c");
        assert!(m.load("c").is_none());
    }

    #[test]
    fn both_strategies_satisfy_the_contract() {
        exercise(&SyncMap::<u32>::new());
        exercise(&RwMap::<u32>::new());
    }
}
