//! Managed threads: long-lived workers with a cooperative stop protocol.
//!
//! A [`ManagedThread`] wraps one native thread running a user supplied [`ThreadBody`]. The
//! controlling code starts it, can ask it to stop, and falls back to abandoning it when the body
//! does not react in time. While a worker runs it is listed in a process-wide registry, which
//! backs [`num_running_threads`], [`current_managed_thread`] and [`stop_all_threads`].
//!
//! # Lifecycle
//!
//! ```text
//! Idle --start--> Starting --gate released--> Running --request_stop--> Stopping
//!   ^                                                                      |
//!   +-------------------------- body returned ----------------------------+
//!                                                    stop timed out -> ForceKilled
//! ```
//!
//! # Timeouts
//!
//! All timeouts are `i32` milliseconds. For wait-style calls ([`ThreadRef::wait`],
//! [`ThreadRef::wait_for_exit`]) zero or negative means "wait forever". For
//! [`ThreadRef::stop`], exactly zero means "do not wait at all" and escalates straight to a
//! forced stop if the thread is still running.
//!
//! # Examples
//!
//! ```rust
//! use managed_thread::{ManagedThread, StopOutcome, ThreadRef};
//!
//! let worker = ManagedThread::new("poller", |thread: &ThreadRef| {
//!     while !thread.thread_should_exit() {
//!         // do a slice of work, then sleep until notified or 10ms passed
//!         thread.wait(10);
//!     }
//! })?;
//!
//! worker.start()?;
//! assert!(worker.is_running());
//!
//! assert_eq!(worker.stop(1000)?, StopOutcome::Exited);
//! assert!(!worker.is_running());
//! # Ok::<(), managed_thread::Error>(())
//! ```

mod builder;
mod managed;
mod native;
mod registry;

use std::{
    thread::{self, ThreadId},
    time::Duration,
};

use log::warn;

pub use builder::Builder;
pub use managed::{ManagedThread, StopOutcome, ThreadBody, ThreadRef, ThreadState};

use registry::registry;

/// Lowest priority accepted by [`ThreadRef::set_priority`].
pub const MIN_PRIORITY: i32 = 0;

/// Highest priority accepted by [`ThreadRef::set_priority`].
pub const MAX_PRIORITY: i32 = 10;

/// Priority of a newly created thread.
pub const DEFAULT_PRIORITY: i32 = 5;

/// How long a freshly spawned worker waits for `start()` to release it.
pub const STARTUP_GATE_TIMEOUT_MS: i32 = 10_000;

/// Polling interval of [`ThreadRef::wait_for_exit`].
pub const EXIT_POLL_INTERVAL_MS: i32 = 5;

/// Timeout used when a running [`ManagedThread`] is dropped.
pub const DROP_STOP_TIMEOUT_MS: i32 = 100;

/// Returns the number of managed threads currently inside their entry point.
pub fn num_running_threads() -> usize {
    registry().len()
}

/// Returns the managed thread executing the caller, if the caller is one.
///
/// Threads that were not created through [`ManagedThread`] always get `None`.
pub fn current_managed_thread() -> Option<ThreadRef> {
    registry().find_by_id(thread::current().id())
}

/// Stops every running managed thread.
///
/// All threads are first asked to exit in a single pass, so they can wind down concurrently.
/// Afterwards each remaining thread is stopped in turn with `timeout_ms`, which may escalate to
/// a forced stop for threads that do not react. When called from a managed thread, that thread
/// is asked to exit like the others but is not waited for.
pub fn stop_all_threads(timeout_ms: i32) {
    let registry = registry();
    registry.request_stop_all();

    let caller = thread::current().id();
    while let Some(thread) = registry.first_except(caller) {
        if let Err(error) = thread.stop(timeout_ms) {
            warn!("failed to stop thread '{}': {}", thread.name(), error);
            break;
        }
    }
}

/// Changes the priority of the calling thread, managed or not.
///
/// # Returns
///
/// `true` if the operating system accepted the new priority.
pub fn set_current_thread_priority(priority: i32) -> bool {
    native::set_current_thread_priority(priority)
}

/// Restricts the calling thread to the CPUs whose bits are set in `mask`.
///
/// # Returns
///
/// `true` if the operating system accepted the mask. Always `false` on platforms without
/// affinity support and for an empty mask.
pub fn set_current_thread_affinity_mask(mask: u64) -> bool {
    native::set_current_thread_affinity_mask(mask)
}

/// Sets the OS-level name of the calling thread.
pub fn set_current_thread_name(name: &str) -> bool {
    native::set_current_thread_name(name)
}

/// Returns the identity of the calling thread.
pub fn current_thread_id() -> ThreadId {
    thread::current().id()
}

/// Suspends the calling thread for `milliseconds`. Non-positive values return immediately.
pub fn sleep(milliseconds: i32) {
    if milliseconds > 0 {
        thread::sleep(Duration::from_millis(u64::from(milliseconds.unsigned_abs())));
    }
}

/// Yields the rest of the calling thread's time slice.
pub fn yield_now() {
    thread::yield_now();
}
