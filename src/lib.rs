//! cmap: a string-keyed map that many threads can use at once, with an
//! exclusive-lock and a reader/writer-lock flavor behind one API.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep the mapping logic and the locking discipline in separate
//!   layers so each can be reasoned about on its own.
//! - Layers:
//!   - Table<V, S>: unsynchronized storage. A `hashbrown::HashTable` index
//!     over a `slotmap::SlotMap` of entries; values are `Arc<V>`.
//!     Mutators take `&mut self`, so the borrow checker rejects sharing a
//!     bare table between threads.
//!   - Strategy: marker types (`Exclusive`, `ReadWrite`) whose generic
//!     associated types name the lock and its read/write guards.
//!   - LockedMap<V, L, S>: a Table behind `L::Lock`. Every operation is
//!     written once and classified as read or write; the strategy decides
//!     what that means. `SyncMap` and `RwMap` are the two instantiations.
//!   - ConcurrentMap<V>: the capability set both containers share.
//!
//! Constraints
//! - Every operation is synchronous and runs to completion under its lock;
//!   there is no timeout or cancellation except the `try_*_for` family.
//! - Guards release on every exit path, unwinding included. `parking_lot`
//!   locks do not poison, so a panicking `range` visitor leaves the map
//!   usable.
//! - Values are never copied or mutated in place: lookups hand out the
//!   stored `Arc<V>`, and `store` replaces it wholesale.
//! - No ordering of iteration; no whole-map snapshot isolation beyond what
//!   a single lock acquisition gives.
//!
//! Range contract
//! - `range` holds the lock (shared on `RwMap`) for the whole traversal and
//!   runs the visitor under it. The locks are not reentrant: a visitor that
//!   calls any method on the same container deadlocks.
//! - Debug builds carry a per-thread reentrancy guard that turns that
//!   deadlock into a panic. Release builds compile it away.
//! - `range_snapshot` is the reentrancy-safe alternative: it copies the
//!   entries under the lock, releases it, then visits the copy.
//!
//! Why this split?
//! - The exclusive and reader/writer containers would otherwise be two
//!   copies of the same code differing only in which lock method they call.
//! - Table carries all the mapping invariants and is tested without any
//!   threads; the container layer only has to get lock classification
//!   right.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its precomputed `u64` hash and the index always
//!   resizes using the stored hash, so keys are hashed once per lookup or
//!   insert and never during growth.

mod concurrent_map;
mod error;
mod locked_map;
mod reentrancy;
mod strategy;
mod table;
mod table_proptest;

// Public surface
pub use concurrent_map::ConcurrentMap;
pub use error::{LockMode, LockTimeout};
pub use locked_map::{LockedMap, RwMap, SyncMap};
pub use strategy::{Exclusive, ReadWrite, Strategy};
pub use table::{Actual, Iter, Table};
