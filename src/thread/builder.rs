//! Configuration of a managed thread before it is created.

use crate::{Error, Result};

use super::{ManagedThread, ThreadBody, DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY};

/// Builder for [`ManagedThread`].
///
/// All settings are optional: an unnamed thread with [`DEFAULT_PRIORITY`], no affinity
/// restriction and the platform's default stack size.
///
/// # Examples
///
/// ```rust
/// use managed_thread::{Builder, ThreadRef};
///
/// let worker = Builder::new()
///     .name("io")
///     .priority(8)
///     .stack_size(512 * 1024)
///     .spawn(|thread: &ThreadRef| {
///         while !thread.thread_should_exit() {
///             thread.wait(50);
///         }
///     })?;
///
/// assert!(worker.is_running());
/// worker.stop(1000)?;
/// # Ok::<(), managed_thread::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    name: String,
    priority: i32,
    affinity_mask: u64,
    stack_size: Option<usize>,
}

impl Builder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Builder {
            name: String::new(),
            priority: DEFAULT_PRIORITY,
            affinity_mask: 0,
            stack_size: None,
        }
    }

    /// Names the thread. The name is also given to the OS thread.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the priority applied on every start, between [`MIN_PRIORITY`] and [`MAX_PRIORITY`].
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the CPU affinity applied on every start. Zero leaves it to the OS.
    #[must_use]
    pub fn affinity_mask(mut self, mask: u64) -> Self {
        self.affinity_mask = mask;
        self
    }

    /// Sets the stack size of the native thread in bytes.
    #[must_use]
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Creates the thread without starting it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidName`] if the name contains a NUL byte
    /// - [`Error::InvalidPriority`] if the priority is out of range
    pub fn build<B: ThreadBody>(self, body: B) -> Result<ManagedThread> {
        if self.name.contains('\0') {
            return Err(Error::InvalidName(self.name));
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(Error::InvalidPriority(self.priority));
        }

        Ok(ManagedThread::from_parts(
            self.name,
            self.priority,
            self.affinity_mask,
            self.stack_size,
            Box::new(body),
        ))
    }

    /// Creates the thread and starts it.
    ///
    /// # Errors
    ///
    /// The errors of [`Builder::build`] and [`crate::ThreadRef::start`].
    pub fn spawn<B: ThreadBody>(self, body: B) -> Result<ManagedThread> {
        let thread = self.build(body)?;
        thread.start()?;
        Ok(thread)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StopOutcome, ThreadRef, ThreadState};
    use serial_test::serial;

    fn noop(_: &ThreadRef) {}

    #[test]
    fn test_defaults() {
        let thread = Builder::new().build(noop).unwrap();

        assert_eq!(thread.name(), "");
        assert_eq!(thread.priority(), DEFAULT_PRIORITY);
        assert_eq!(thread.affinity_mask(), 0);
        assert_eq!(thread.state(), ThreadState::Idle);
        assert!(!thread.is_running());
    }

    #[test]
    fn test_settings_carried_over() {
        let thread = Builder::default()
            .name("configured")
            .priority(MAX_PRIORITY)
            .affinity_mask(0b11)
            .build(noop)
            .unwrap();

        assert_eq!(thread.name(), "configured");
        assert_eq!(thread.priority(), MAX_PRIORITY);
        assert_eq!(thread.affinity_mask(), 0b11);
    }

    #[test]
    fn test_invalid_priority() {
        let result = Builder::new().priority(MIN_PRIORITY - 1).build(noop);
        assert!(matches!(result, Err(Error::InvalidPriority(-1))));

        let result = Builder::new().priority(MAX_PRIORITY + 1).build(noop);
        assert!(matches!(result, Err(Error::InvalidPriority(11))));
    }

    #[test]
    fn test_invalid_name() {
        let result = Builder::new().name("bad\0name").build(noop);
        match result {
            Err(Error::InvalidName(name)) => assert_eq!(name, "bad\0name"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_spawn_starts_thread() {
        let thread = Builder::new()
            .name("spawned")
            .stack_size(256 * 1024)
            .spawn(|this: &ThreadRef| {
                while !this.thread_should_exit() {
                    this.wait(-1);
                }
            })
            .unwrap();

        assert!(thread.is_running());
        assert_eq!(thread.stop(1000).unwrap(), StopOutcome::Exited);
    }
}
