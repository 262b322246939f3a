//! Reentrant mutual exclusion with scope-bound acquisition.
//!
//! A [`CriticalSection`] may be locked again by the thread that already holds it. The managed
//! thread lifecycle depends on this: `start_with_priority` re-enters `start` while holding the
//! lifecycle lock, and a forced stop takes the registry lock while the lifecycle lock of the
//! stopped thread is held.
//!
//! There is no `enter`/`exit` pair. The only way to hold the lock is a [`ScopedLock`] guard,
//! which releases on every exit path including `?` propagation and unwinding.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// Guard returned by [`CriticalSection::lock`]; the lock is released when it is dropped.
pub type ScopedLock<'a, T> = ReentrantMutexGuard<'a, T>;

/// A reentrant lock protecting a value of type `T`.
///
/// Because the same thread may hold several guards at once, the guard only gives shared access
/// to `T`. Wrap mutable state in a `Cell`/`RefCell` (or atomics) to modify it.
///
/// # Examples
///
/// ```rust
/// use managed_thread::sync::CriticalSection;
/// use std::cell::Cell;
///
/// let section = CriticalSection::new(Cell::new(0));
///
/// let outer = section.lock();
/// {
///     let inner = section.lock();
///     inner.set(inner.get() + 1);
/// }
/// outer.set(outer.get() + 1);
///
/// assert_eq!(outer.get(), 2);
/// ```
#[derive(Debug, Default)]
pub struct CriticalSection<T> {
    inner: ReentrantMutex<T>,
}

impl<T> CriticalSection<T> {
    /// Creates a new, unlocked critical section protecting `value`.
    pub fn new(value: T) -> Self {
        CriticalSection {
            inner: ReentrantMutex::new(value),
        }
    }

    /// Acquires the lock, blocking until it is available.
    ///
    /// Returns immediately if the calling thread already holds the lock.
    pub fn lock(&self) -> ScopedLock<'_, T> {
        self.inner.lock()
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// # Returns
    ///
    /// `None` if another thread holds the lock.
    pub fn try_lock(&self) -> Option<ScopedLock<'_, T>> {
        self.inner.try_lock()
    }
}
