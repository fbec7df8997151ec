//! Synchronization primitives.
//!
//! - [`SpinLock`]: busy-waiting lock for short critical sections such as the
//!   process table and per-process bookkeeping.
//! - [`Semaphore`]: the blocking counting semaphore supplied by the thread
//!   layer.
//! - [`SleepLock`]: a mutual-exclusion lock that blocks on a [`Semaphore`]
//!   instead of spinning, for long critical sections like file system I/O.

mod sleeplock;
mod spinlock;

pub use sleeplock::{SleepLock, SleepLockGuard};
pub use spinlock::{SpinLock, SpinLockGuard};

/// A counting semaphore provided by the scheduler.
///
/// `down` blocks the calling thread until the count is positive and then
/// decrements it; `up` increments the count and wakes one waiter.
pub trait Semaphore: Send + Sync {
    /// Creates a semaphore with the given initial count.
    fn new(value: u32) -> Self
    where
        Self: Sized;

    /// Waits for the count to become positive, then decrements it.
    fn down(&self);

    /// Increments the count, waking one blocked thread if any.
    fn up(&self);
}
