//! Lock strategies: how a container maps "read" and "write" access onto a
//! concrete lock.
//!
//! A strategy is a zero-sized marker type. The lock it builds and the guards
//! it hands out are generic associated types, so a container written once
//! against [`Strategy`] gets either locking discipline with no dynamic
//! dispatch.

use core::ops::{Deref, DerefMut};
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// A locking discipline for a value of type `T`.
///
/// Guards release the lock when dropped, including during unwinding.
/// Neither lock is reentrant: acquiring any guard while the same thread
/// already holds one on the same lock may deadlock.
pub trait Strategy {
    /// The lock wrapping the protected value.
    type Lock<T>;

    /// Guard for read-only access.
    type Read<'a, T: 'a>: Deref<Target = T>;

    /// Guard for exclusive access.
    type Write<'a, T: 'a>: DerefMut<Target = T>;

    fn new<T>(value: T) -> Self::Lock<T>;

    fn into_inner<T>(lock: Self::Lock<T>) -> T;

    /// Block until read access is granted.
    fn read<'a, T: 'a>(lock: &'a Self::Lock<T>) -> Self::Read<'a, T>;

    /// Block until exclusive access is granted.
    fn write<'a, T: 'a>(lock: &'a Self::Lock<T>) -> Self::Write<'a, T>;

    /// Wait at most `timeout` for read access.
    fn try_read_for<'a, T: 'a>(
        lock: &'a Self::Lock<T>,
        timeout: Duration,
    ) -> Option<Self::Read<'a, T>>;

    /// Wait at most `timeout` for exclusive access.
    fn try_write_for<'a, T: 'a>(
        lock: &'a Self::Lock<T>,
        timeout: Duration,
    ) -> Option<Self::Write<'a, T>>;

    /// Exclusive access through `&mut`, no locking needed.
    fn get_mut<T>(lock: &mut Self::Lock<T>) -> &mut T;
}

/// One mutex for everything: reads and writes are fully serialized.
#[derive(Copy, Clone, Debug)]
pub enum Exclusive {}

/// Reader/writer lock: many concurrent readers or one writer.
///
/// Backed by `parking_lot::RwLock`, which is task-fair: a reader arriving
/// while a writer waits queues behind it. Recursive read acquisition on one
/// thread can therefore deadlock.
#[derive(Copy, Clone, Debug)]
pub enum ReadWrite {}

impl Strategy for Exclusive {
    type Lock<T> = Mutex<T>;
    type Read<'a, T: 'a> = MutexGuard<'a, T>;
    type Write<'a, T: 'a> = MutexGuard<'a, T>;

    #[inline]
    fn new<T>(value: T) -> Mutex<T> {
        Mutex::new(value)
    }

    #[inline]
    fn into_inner<T>(lock: Mutex<T>) -> T {
        lock.into_inner()
    }

    #[inline]
    fn read<'a, T: 'a>(lock: &'a Mutex<T>) -> MutexGuard<'a, T> {
        lock.lock()
    }

    #[inline]
    fn write<'a, T: 'a>(lock: &'a Mutex<T>) -> MutexGuard<'a, T> {
        lock.lock()
    }

    #[inline]
    fn try_read_for<'a, T: 'a>(
        lock: &'a Mutex<T>,
        timeout: Duration,
    ) -> Option<MutexGuard<'a, T>> {
        lock.try_lock_for(timeout)
    }

    #[inline]
    fn try_write_for<'a, T: 'a>(
        lock: &'a Mutex<T>,
        timeout: Duration,
    ) -> Option<MutexGuard<'a, T>> {
        lock.try_lock_for(timeout)
    }

    #[inline]
    fn get_mut<T>(lock: &mut Mutex<T>) -> &mut T {
        lock.get_mut()
    }
}

impl Strategy for ReadWrite {
    type Lock<T> = RwLock<T>;
    type Read<'a, T: 'a> = RwLockReadGuard<'a, T>;
    type Write<'a, T: 'a> = RwLockWriteGuard<'a, T>;

    #[inline]
    fn new<T>(value: T) -> RwLock<T> {
        RwLock::new(value)
    }

    #[inline]
    fn into_inner<T>(lock: RwLock<T>) -> T {
        lock.into_inner()
    }

    #[inline]
    fn read<'a, T: 'a>(lock: &'a RwLock<T>) -> RwLockReadGuard<'a, T> {
        lock.read()
    }

    #[inline]
    fn write<'a, T: 'a>(lock: &'a RwLock<T>) -> RwLockWriteGuard<'a, T> {
        lock.write()
    }

    #[inline]
    fn try_read_for<'a, T: 'a>(
        lock: &'a RwLock<T>,
        timeout: Duration,
    ) -> Option<RwLockReadGuard<'a, T>> {
        lock.try_read_for(timeout)
    }

    #[inline]
    fn try_write_for<'a, T: 'a>(
        lock: &'a RwLock<T>,
        timeout: Duration,
    ) -> Option<RwLockWriteGuard<'a, T>> {
        lock.try_write_for(timeout)
    }

    #[inline]
    fn get_mut<T>(lock: &mut RwLock<T>) -> &mut T {
        lock.get_mut()
    }
}
