// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'thread/native.rs' calls into libc for priorities, affinity and thread names

//! # managed-thread
//!
//! Long-lived worker threads with a cooperative stop protocol, built for programs that own a
//! handful of background workers (audio, I/O, timers, pollers) and need to start, stop and
//! restart them deterministically.
//!
//! ## Features
//!
//! - **Cooperative stop** - bodies poll [`ThreadRef::thread_should_exit`] and are woken through
//!   [`ThreadRef::notify`]
//! - **Bounded shutdown** - [`ThreadRef::stop`] waits up to a timeout and abandons the thread
//!   if it does not react
//! - **Restartable** - a stopped thread can be started again and runs its body anew
//! - **Process-wide registry** - [`num_running_threads`], [`current_managed_thread`] and
//!   [`stop_all_threads`]
//! - **Best-effort scheduling** - priorities, CPU affinity and OS thread names
//! - **Synchronization primitives** - [`sync::WaitableEvent`] and the reentrant
//!   [`sync::CriticalSection`]
//!
//! ## Quick Start
//!
//! ```rust
//! use managed_thread::prelude::*;
//!
//! let worker = ManagedThread::new("ticker", |thread: &ThreadRef| {
//!     while !thread.thread_should_exit() {
//!         // one unit of work
//!         thread.wait(20);
//!     }
//! })?;
//!
//! worker.start()?;
//! assert!(worker.is_running());
//!
//! match worker.stop(500)? {
//!     StopOutcome::Exited => println!("clean exit"),
//!     StopOutcome::ForceKilled => println!("worker was abandoned"),
//!     StopOutcome::NotRunning => unreachable!(),
//! }
//! # Ok::<(), managed_thread::Error>(())
//! ```
//!
//! ## Forced stops
//!
//! Rust cannot safely terminate a thread from the outside. When a body ignores a stop request
//! for longer than the timeout, the native thread is detached instead: the managed thread is
//! reported as stopped and may be restarted, while the abandoned body keeps running until it
//! returns on its own. Its late exit does not touch the managed thread anymore. The abandoned
//! body keeps seeing [`ThreadRef::thread_should_exit`] as `true` and is woken from
//! [`ThreadRef::wait`], so a cooperative but slow body still winds down after a restart.
//!
//! ## Logging
//!
//! Lifecycle events are reported through the [`log`] facade: thread starts and exits at
//! `debug`, recoverable platform failures at `warn`, and forced stops, panicking bodies and
//! misuse at `error`. Install any `log` backend to see them.

pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and functions.
///
/// # Example
///
/// ```rust
/// use managed_thread::prelude::*;
///
/// let event = WaitableEvent::new(false);
/// event.signal();
/// assert!(event.wait(0));
/// ```
pub mod prelude;

/// Synchronization primitives used by managed threads and available to their bodies.
pub mod sync;

/// Managed threads, their builder and the process-wide thread functions.
pub mod thread;

/// `managed-thread` Error type
///
/// See [`Error`] for the list of failure cases.
pub use error::Error;

/// `managed-thread` Result type
///
/// A type alias for `std::result::Result<T, Error>`.
///
/// # Examples
///
/// ```rust
/// use managed_thread::{ManagedThread, Result, ThreadRef};
///
/// fn launch(name: &str) -> Result<ManagedThread> {
///     let worker = ManagedThread::new(name, |thread: &ThreadRef| {
///         while !thread.thread_should_exit() {
///             thread.wait(-1);
///         }
///     })?;
///     worker.start()?;
///     Ok(worker)
/// }
/// # let worker = launch("launched")?;
/// # worker.stop(1000)?;
/// # Ok::<(), managed_thread::Error>(())
/// ```
pub type Result<T> = std::result::Result<T, Error>;

pub use thread::{
    current_managed_thread, current_thread_id, num_running_threads, set_current_thread_affinity_mask,
    set_current_thread_name, set_current_thread_priority, sleep, stop_all_threads, yield_now,
    Builder, ManagedThread, StopOutcome, ThreadBody, ThreadRef, ThreadState, DEFAULT_PRIORITY,
    DROP_STOP_TIMEOUT_MS, EXIT_POLL_INTERVAL_MS, MAX_PRIORITY, MIN_PRIORITY,
    STARTUP_GATE_TIMEOUT_MS,
};
