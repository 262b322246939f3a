//! Blocking event used for thread start-up gating and wait/notify.
//!
//! A [`WaitableEvent`] is a binary semaphore: [`WaitableEvent::signal`] sets it and
//! [`WaitableEvent::wait`] blocks until it is set. An auto-reset event (the default) clears
//! itself when a waiter is released, so one signal releases one wait. That is the property the
//! start-up gate of a [`crate::ManagedThread`] relies on: `start()` signals once and the freshly
//! spawned worker consumes the signal exactly once.
//!
//! A signal that arrives while nobody is waiting is not lost; it stays pending until the next
//! call to `wait` (or an explicit [`WaitableEvent::reset`]).

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A binary semaphore with millisecond timeouts.
///
/// # Examples
///
/// ```rust
/// use managed_thread::sync::WaitableEvent;
/// use std::sync::Arc;
/// use std::thread;
///
/// let event = Arc::new(WaitableEvent::default());
/// let event_clone = Arc::clone(&event);
///
/// let handle = thread::spawn(move || event_clone.wait(-1));
/// event.signal();
///
/// assert!(handle.join().unwrap());
/// ```
#[derive(Debug)]
pub struct WaitableEvent {
    /// Whether the event is currently signalled
    triggered: Mutex<bool>,
    /// Condition variable for blocking/waking threads
    condvar: Condvar,
    /// Keep the event signalled after a waiter has been released
    manual_reset: bool,
}

impl WaitableEvent {
    /// Creates a new, unsignalled event.
    ///
    /// # Arguments
    ///
    /// * `manual_reset` - If `true` the event stays signalled until [`WaitableEvent::reset`] is
    ///   called, releasing every waiter. If `false` each successful wait clears the event again.
    pub fn new(manual_reset: bool) -> Self {
        WaitableEvent {
            triggered: Mutex::new(false),
            condvar: Condvar::new(),
            manual_reset,
        }
    }

    /// Blocks the calling thread until the event is signalled or the timeout elapses.
    ///
    /// # Arguments
    ///
    /// * `timeout_ms` - Maximum time to wait in milliseconds. Zero or negative values wait
    ///   indefinitely.
    ///
    /// # Returns
    ///
    /// `true` if the event was signalled, `false` if the timeout elapsed first.
    pub fn wait(&self, timeout_ms: i32) -> bool {
        let mut triggered = self.triggered.lock();

        if timeout_ms <= 0 {
            while !*triggered {
                self.condvar.wait(&mut triggered);
            }
        } else {
            let deadline =
                Instant::now() + Duration::from_millis(u64::from(timeout_ms.unsigned_abs()));
            while !*triggered {
                if self.condvar.wait_until(&mut triggered, deadline).timed_out() && !*triggered {
                    return false;
                }
            }
        }

        if !self.manual_reset {
            *triggered = false;
        }

        true
    }

    /// Signals the event, waking up waiting threads.
    ///
    /// With an auto-reset event only the first thread to observe the signal is released, the
    /// others go back to waiting.
    pub fn signal(&self) {
        *self.triggered.lock() = true;
        self.condvar.notify_all();
    }

    /// Clears a pending signal without waking anyone.
    pub fn reset(&self) {
        *self.triggered.lock() = false;
    }

    /// Returns `true` if the event is currently signalled.
    pub fn is_signaled(&self) -> bool {
        *self.triggered.lock()
    }
}

impl Default for WaitableEvent {
    fn default() -> Self {
        WaitableEvent::new(false)
    }
}
