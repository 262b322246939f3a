use thiserror::Error;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Only operations that can be misused or that depend on the operating system return an
/// [`Error`]. Best-effort platform calls (priority, affinity, thread names) report failure through
/// a `bool` instead, and a forced termination is reported through
/// [`crate::StopOutcome::ForceKilled`] rather than as an error.
///
/// # Error Categories
///
/// ## Programming Errors
/// - [`Error::SelfJoin`] - A thread attempted to stop or wait for itself
/// - [`Error::InvalidPriority`] - A priority outside of the supported range
/// - [`Error::InvalidName`] - A thread name that cannot be passed to the operating system
///
/// ## Resource Errors
/// - [`Error::Spawn`] - The operating system refused to create a native thread
///
/// # Examples
///
/// ```rust
/// use managed_thread::{Error, ManagedThread};
///
/// match ManagedThread::builder().priority(42).build(|_: &managed_thread::ThreadRef| {}) {
///     Ok(_) => println!("thread created"),
///     Err(Error::InvalidPriority(priority)) => println!("rejected priority {}", priority),
///     Err(e) => println!("other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A managed thread tried to stop, or wait for the exit of, itself.
    ///
    /// Waiting for the current thread to finish can never succeed, so the request is rejected
    /// instead of deadlocking. The `operation` names the rejected call.
    #[error("A managed thread cannot {operation} itself")]
    SelfJoin {
        /// The operation that was attempted, e.g. `"stop"`
        operation: &'static str,
    },

    /// The native thread could not be created.
    ///
    /// Wraps the I/O error reported by the operating system. The managed thread stays idle and
    /// [`crate::ThreadRef::is_running`] keeps returning `false`.
    #[error("Failed to create native thread - {0}")]
    Spawn(#[from] std::io::Error),

    /// The requested priority is outside of [`crate::MIN_PRIORITY`]..=[`crate::MAX_PRIORITY`].
    #[error("Priority {0} is out of range")]
    InvalidPriority(i32),

    /// The thread name contains an interior NUL byte and cannot be handed to the OS.
    #[error("Invalid thread name - {0:?}")]
    InvalidName(String),
}
