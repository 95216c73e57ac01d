//! Debug-only reentrancy guard for range callbacks.
//!
//! A container holds its lock for the whole of `range`, and neither lock is
//! reentrant, so calling back into the same container from the visitor would
//! deadlock. In debug builds each thread records which containers it is
//! currently ranging over, and every container operation checks that record
//! first and panics instead of hanging. In release builds this compiles to a
//! zero-cost no-op.

#[cfg(debug_assertions)]
use std::cell::RefCell;

#[cfg(debug_assertions)]
std::thread_local! {
    // Identities of the containers whose `range` is on this thread's stack.
    static ACTIVE: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Per-instance reentrancy tracker. Embed this in a container; its address
/// identifies the container for as long as it is borrowed.
#[derive(Debug, Default)]
pub struct DebugReentrancy {
    // Non-zero-sized so two trackers never share an address.
    _id: u8,
}

impl DebugReentrancy {
    /// Create a new reentrancy tracker. Const so it can be a field default.
    pub const fn new() -> Self {
        Self { _id: 0 }
    }

    #[cfg(debug_assertions)]
    #[inline]
    fn id(&self) -> usize {
        self as *const Self as usize
    }

    /// Panic (debug builds) if the current thread is inside a range
    /// callback of this container.
    #[inline]
    pub fn check(&self) {
        #[cfg(debug_assertions)]
        {
            let id = self.id();
            let nested = ACTIVE.with(|a| a.borrow().contains(&id));
            assert!(
                !nested,
                "reentrancy detected: container accessed from inside its own range callback"
            );
        }
    }

    /// Check, then mark the current thread as ranging over this container
    /// until the returned guard drops.
    #[inline]
    pub fn enter(&self) -> ReentrancyGuard<'_> {
        self.check();

        #[cfg(debug_assertions)]
        {
            let id = self.id();
            ACTIVE.with(|a| a.borrow_mut().push(id));
            return ReentrancyGuard { owner: self };
        }

        #[cfg(not(debug_assertions))]
        {
            return ReentrancyGuard {
                _z: core::marker::PhantomData,
            };
        }
    }
}

/// RAII guard returned by `DebugReentrancy::enter`.
pub struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _z: core::marker::PhantomData<&'a ()>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let id = self.owner.id();
            ACTIVE.with(|a| {
                let mut a = a.borrow_mut();
                if let Some(pos) = a.iter().rposition(|&x| x == id) {
                    a.remove(pos);
                }
            });
        }
    }
}
