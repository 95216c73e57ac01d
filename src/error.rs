//! Error type for timed lock acquisition.

use core::fmt;
use std::time::Duration;

/// Which side of a container's lock an operation asked for.
///
/// On an exclusive-lock container both modes map to the same mutex.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LockMode {
    /// Shared access: lookups and iteration.
    Read,
    /// Exclusive access: every mutation.
    Write,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Read => f.write_str("read"),
            LockMode::Write => f.write_str("write"),
        }
    }
}

/// The lock could not be acquired before the deadline passed.
///
/// Returned only by the `try_*_for` family; the untimed operations block
/// until the lock is available and never fail.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, thiserror::Error)]
#[error("timed out after {waited:?} waiting for the {mode} lock")]
pub struct LockTimeout {
    pub mode: LockMode,
    pub waited: Duration,
}
