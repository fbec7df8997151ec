//! Blocking mutual exclusion lock built on a [`Semaphore`].
//!
//! A waiter sleeps in [`Semaphore::down`] instead of burning CPU, which makes
//! this the right lock for critical sections that do I/O.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use super::Semaphore;

/// A sleeping mutual exclusion lock protecting a `T`.
///
/// The semaphore starts at one; acquiring takes the token and dropping the
/// guard returns it.
pub struct SleepLock<T, S: Semaphore> {
    sema: S,
    data: UnsafeCell<T>,
}

// SAFETY: Access to `data` is serialized by the binary semaphore.
unsafe impl<T: Send, S: Semaphore> Send for SleepLock<T, S> {}
unsafe impl<T: Send, S: Semaphore> Sync for SleepLock<T, S> {}

impl<T, S: Semaphore> SleepLock<T, S> {
    /// Creates a new unlocked `SleepLock` wrapping `value`.
    pub fn new(value: T) -> Self {
        Self {
            sema: S::new(1),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, sleeping until it becomes available.
    pub fn lock(&self) -> SleepLockGuard<'_, T, S> {
        self.sema.down();
        SleepLockGuard { lock: self }
    }
}

/// RAII guard that releases the [`SleepLock`] when dropped.
pub struct SleepLockGuard<'a, T, S: Semaphore> {
    lock: &'a SleepLock<T, S>,
}

impl<T, S: Semaphore> Deref for SleepLockGuard<'_, T, S> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The guard holds the semaphore token.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T, S: Semaphore> DerefMut for SleepLockGuard<'_, T, S> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The guard holds the semaphore token.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T, S: Semaphore> Drop for SleepLockGuard<'_, T, S> {
    fn drop(&mut self) {
        self.lock.sema.up();
    }
}
