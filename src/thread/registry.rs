//! Process-wide registry of running managed threads.
//!
//! A thread is added by its own entry point once it starts executing and removed by the same
//! entry point when it finishes. The only exception is a forced stop, where the controller
//! removes the entry on behalf of a thread that is no longer tracked.
//!
//! Entries are [`ThreadRef`]s. They keep the shared thread state alive, but the registry never
//! drives the lifecycle itself; it only answers "which threads are running" questions.

use std::{cell::RefCell, sync::LazyLock, thread::ThreadId};

use log::error;

use crate::sync::CriticalSection;

use super::ThreadRef;

static REGISTRY: LazyLock<ThreadRegistry> = LazyLock::new(ThreadRegistry::new);

/// Returns the registry shared by all managed threads of this process.
pub(crate) fn registry() -> &'static ThreadRegistry {
    &REGISTRY
}

/// A set of running threads guarded by a single [`CriticalSection`].
#[derive(Debug)]
pub(crate) struct ThreadRegistry {
    threads: CriticalSection<RefCell<Vec<ThreadRef>>>,
}

impl ThreadRegistry {
    pub(crate) fn new() -> Self {
        ThreadRegistry {
            threads: CriticalSection::new(RefCell::new(Vec::new())),
        }
    }

    /// Adds a thread that has just entered its entry point.
    pub(crate) fn register(&self, thread: ThreadRef) {
        self.threads.lock().borrow_mut().push(thread);
    }

    /// Removes a thread that is leaving its entry point.
    ///
    /// Every registered thread unregisters exactly once, so a missing entry indicates broken
    /// bookkeeping. It is reported and otherwise ignored.
    ///
    /// # Returns
    ///
    /// `true` if the thread was found and removed.
    pub(crate) fn unregister(&self, thread: &ThreadRef) -> bool {
        let removed = self.remove(thread);
        if !removed {
            error!("thread '{}' was not registered when it exited", thread.name());
        }

        removed
    }

    /// Removes the first entry for `thread`, if any.
    pub(crate) fn remove(&self, thread: &ThreadRef) -> bool {
        let guard = self.threads.lock();
        let mut threads = guard.borrow_mut();

        match threads.iter().position(|entry| entry == thread) {
            Some(index) => {
                threads.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.threads.lock().borrow().len()
    }

    /// Finds the running thread whose current native identity is `id`.
    pub(crate) fn find_by_id(&self, id: ThreadId) -> Option<ThreadRef> {
        let guard = self.threads.lock();
        let threads = guard.borrow();

        threads
            .iter()
            .find(|thread| thread.thread_id() == Some(id))
            .cloned()
    }

    /// Returns the first registered thread that is not the thread with identity `id`.
    ///
    /// The lock is released before returning, so the caller may block on the returned thread.
    pub(crate) fn first_except(&self, id: ThreadId) -> Option<ThreadRef> {
        let guard = self.threads.lock();
        let threads = guard.borrow();

        threads
            .iter()
            .find(|thread| thread.thread_id() != Some(id))
            .cloned()
    }

    /// Asks every registered thread to exit, under a single acquisition of the lock.
    pub(crate) fn request_stop_all(&self) {
        let guard = self.threads.lock();
        for thread in guard.borrow().iter() {
            thread.request_stop();
        }
    }
}
