//! Synchronization primitives used by the managed thread lifecycle.
//!
//! This module provides the two building blocks that [`crate::thread`] is assembled from.
//! Both are usable on their own.
//!
//! # Key Components
//!
//! - [`WaitableEvent`] - A binary semaphore with millisecond timeouts, used for the startup
//!   gate and for generic wait/notify between a thread body and its controller
//! - [`CriticalSection`] - A reentrant mutual-exclusion lock which can only be acquired through
//!   a [`ScopedLock`] guard

mod critical_section;
mod event;

pub use critical_section::{CriticalSection, ScopedLock};
pub use event::WaitableEvent;
