//! # managed-thread Prelude
//!
//! The types and functions needed to write and control a managed thread, for glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all managed-thread operations
pub use crate::Error;

/// The result type used throughout managed-thread
pub use crate::Result;

// ================================================================================================
// Managed Threads
// ================================================================================================

/// Owning handle, shared reference and builder of a managed thread
pub use crate::{Builder, ManagedThread, ThreadRef};

/// The body trait implemented by closures taking `&ThreadRef`
pub use crate::ThreadBody;

/// Lifecycle state and stop result
pub use crate::{StopOutcome, ThreadState};

/// Process-wide thread functions
pub use crate::{current_managed_thread, num_running_threads, stop_all_threads};

// ================================================================================================
// Synchronization
// ================================================================================================

/// Signalable event and reentrant lock
pub use crate::sync::{CriticalSection, ScopedLock, WaitableEvent};
