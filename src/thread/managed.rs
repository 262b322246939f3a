//! The managed thread state machine and its entry-point trampoline.
//!
//! [`ManagedThread`] owns a worker; [`ThreadRef`] is a cheap, cloneable view of the same worker
//! that is handed to the body, stored in the registry and returned by
//! [`crate::current_managed_thread`]. All lifecycle operations live on [`ThreadRef`];
//! `ManagedThread` dereferences to it and adds stop-on-drop.
//!
//! # Locking
//!
//! Every thread has a reentrant lifecycle lock serializing `start`, `stop` and priority changes,
//! and a plain lock around its native handle. The worker itself never takes the lifecycle lock,
//! so a controller may hold it while waiting for the worker to finish. Locks are always taken in
//! the order lifecycle, handle, registry, identity. The slot holding the wake event is only held
//! for a moment and never while blocking.

use std::{
    any::Any,
    fmt, mem,
    ops::Deref,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicU8, Ordering},
        Arc,
    },
    thread::{self, ThreadId},
    time::Duration,
};

use log::{debug, error, warn};
use parking_lot::Mutex;
use strum::{Display, FromRepr};

use crate::{
    sync::{CriticalSection, WaitableEvent},
    Error, Result,
};

use super::{
    native::{self, NativeHandle},
    registry::registry,
    Builder, DROP_STOP_TIMEOUT_MS, EXIT_POLL_INTERVAL_MS, MAX_PRIORITY, MIN_PRIORITY,
    STARTUP_GATE_TIMEOUT_MS,
};

/// The code a managed thread runs.
///
/// The body should poll [`ThreadRef::thread_should_exit`] regularly and return once it is set.
/// Blocking on [`ThreadRef::wait`] instead of sleeping keeps it responsive, since
/// [`ThreadRef::stop`] notifies the thread after requesting the exit.
///
/// A body runs once per call to [`ThreadRef::start`], so a restarted thread runs it again.
/// Closures taking `&ThreadRef` implement this trait.
pub trait ThreadBody: Send + Sync + 'static {
    /// Executes the body on the managed thread.
    fn run(&self, thread: &ThreadRef);
}

impl<F> ThreadBody for F
where
    F: Fn(&ThreadRef) + Send + Sync + 'static,
{
    fn run(&self, thread: &ThreadRef) {
        self(thread)
    }
}

/// Lifecycle state of a managed thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum ThreadState {
    /// Never started, or the last run has finished its cleanup
    Idle,
    /// The native thread exists but the body has not been entered yet
    Starting,
    /// The body is executing
    Running,
    /// An exit was requested and the body has not returned yet
    Stopping,
    /// The last run did not stop in time and was abandoned
    ForceKilled,
}

/// Result of [`ThreadRef::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The thread was not running
    NotRunning,
    /// The body returned within the timeout
    Exited,
    /// The body did not return in time and the native thread was abandoned.
    ///
    /// Whatever the body held at that point (locks, events, buffers) is left as it was.
    ForceKilled,
}

struct ThreadInner {
    name: String,
    stack_size: Option<usize>,
    body: Box<dyn ThreadBody>,
    lifecycle: CriticalSection<()>,
    handle: Mutex<Option<NativeHandle>>,
    thread_id: Mutex<Option<ThreadId>>,
    priority: AtomicI32,
    affinity_mask: AtomicU64,
    should_exit: AtomicBool,
    state: AtomicU8,
    runs: AtomicU64,
    /// Run number of the native thread owning the handle, `0` while none does
    active_run: AtomicU64,
    startup_gate: WaitableEvent,
    /// Replaced on a forced stop so the abandoned run keeps its own event
    wake_event: Mutex<Arc<WaitableEvent>>,
}

/// Ties a reference to the run it was handed to.
#[derive(Clone)]
struct RunBinding {
    number: u64,
    wake_event: Arc<WaitableEvent>,
}

/// A shared reference to a managed thread.
///
/// Two `ThreadRef`s compare equal when they refer to the same thread.
///
/// The reference passed to a body (and returned by [`crate::current_managed_thread`] on the
/// worker) is bound to that run. Once the run has been abandoned by a forced stop it reports
/// [`ThreadRef::thread_should_exit`] and never blocks in [`ThreadRef::wait`], even after the
/// thread was started again.
#[derive(Clone)]
pub struct ThreadRef {
    inner: Arc<ThreadInner>,
    run: Option<RunBinding>,
}

impl ThreadRef {
    /// The name given to the thread at construction.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ThreadState {
        ThreadState::from_repr(self.inner.state.load(Ordering::SeqCst)).unwrap_or(ThreadState::Idle)
    }

    /// Starts the thread.
    ///
    /// Spawns the native thread, applies the stored priority and releases the worker into its
    /// body. Does nothing if the thread is already running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the operating system could not create the thread. The thread
    /// stays idle in that case.
    pub fn start(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock();
        let mut slot = self.inner.handle.lock();
        if slot.is_some() {
            return Ok(());
        }

        self.inner.should_exit.store(false, Ordering::SeqCst);
        self.inner.startup_gate.reset();

        let run = self.inner.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let worker = self.bind(run);
        let handle = match native::spawn(&self.inner.name, self.inner.stack_size, run, move || {
            worker.entry_point(run)
        }) {
            Ok(handle) => handle,
            Err(err) => {
                error!("failed to create thread '{}': {}", self.inner.name, err);
                return Err(Error::Spawn(err));
            }
        };

        let priority = self.priority();
        if !native::set_thread_priority(&handle, priority) {
            debug!("thread '{}' keeps its default priority, {} was not applied", self.inner.name, priority);
        }

        *slot = Some(handle);
        self.inner.active_run.store(run, Ordering::SeqCst);
        drop(slot);

        self.set_state(ThreadState::Starting);
        debug!("started thread '{}' (run {})", self.inner.name, run);

        self.inner.startup_gate.signal();
        Ok(())
    }

    /// Starts the thread with `priority`, or changes the priority of the running thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPriority`] for priorities outside
    /// [`MIN_PRIORITY`]..=[`MAX_PRIORITY`], otherwise the errors of [`ThreadRef::start`].
    pub fn start_with_priority(&self, priority: i32) -> Result<()> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return Err(Error::InvalidPriority(priority));
        }

        let _lifecycle = self.inner.lifecycle.lock();
        if self.is_running() {
            if !self.set_priority(priority) {
                debug!("could not change priority of thread '{}' to {}", self.inner.name, priority);
            }
            return Ok(());
        }

        self.inner.priority.store(priority, Ordering::SeqCst);
        self.start()
    }

    /// Returns `true` while the thread owns a native handle.
    ///
    /// This tracks the handle, not the operating system: the flag turns `false` once the worker
    /// has finished its cleanup, or immediately when the thread is force-stopped.
    pub fn is_running(&self) -> bool {
        self.inner.handle.lock().is_some()
    }

    /// Asks the body to return. Does not block.
    pub fn request_stop(&self) {
        self.inner.should_exit.store(true, Ordering::SeqCst);
        let _ = self
            .inner
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |state| {
                matches!(
                    ThreadState::from_repr(state),
                    Some(ThreadState::Starting | ThreadState::Running)
                )
                .then_some(ThreadState::Stopping as u8)
            });
    }

    /// Returns `true` once an exit has been requested for the current run, or when called
    /// through a reference of a run that was abandoned.
    pub fn thread_should_exit(&self) -> bool {
        self.inner.should_exit.load(Ordering::SeqCst) || self.is_abandoned()
    }

    /// Waits for the thread to finish.
    ///
    /// Polls every [`EXIT_POLL_INTERVAL_MS`] milliseconds. A zero or negative timeout waits
    /// forever.
    ///
    /// # Returns
    ///
    /// `Ok(false)` if a positive timeout elapsed while the thread was still running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelfJoin`] when called from the thread being waited for.
    pub fn wait_for_exit(&self, timeout_ms: i32) -> Result<bool> {
        self.ensure_not_current("wait for")?;

        let mut remaining = timeout_ms / EXIT_POLL_INTERVAL_MS;
        while self.is_running() {
            if timeout_ms > 0 {
                remaining -= 1;
                if remaining < 0 {
                    return Ok(false);
                }
            }

            thread::sleep(Duration::from_millis(EXIT_POLL_INTERVAL_MS as u64));
        }

        Ok(true)
    }

    /// Stops the thread.
    ///
    /// Requests the exit, wakes the body if it is blocked in [`ThreadRef::wait`], and waits up
    /// to `timeout_ms` for it to return. A timeout of exactly zero does not wait; a negative
    /// timeout waits forever. If the thread is still running afterwards it is abandoned: the
    /// native thread is detached and all bookkeeping is cleared as if it had exited.
    ///
    /// A forced stop leaves whatever the body held in an undefined state. Bodies that react
    /// promptly to [`ThreadRef::thread_should_exit`] never reach it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelfJoin`] when called from the thread being stopped.
    pub fn stop(&self, timeout_ms: i32) -> Result<StopOutcome> {
        self.ensure_not_current("stop")?;

        let _lifecycle = self.inner.lifecycle.lock();
        if !self.is_running() {
            return Ok(StopOutcome::NotRunning);
        }

        self.request_stop();
        self.notify();

        if timeout_ms != 0 {
            self.wait_for_exit(timeout_ms)?;
        }

        if !self.is_running() {
            return Ok(StopOutcome::Exited);
        }

        Ok(self.force_kill())
    }

    /// Changes the priority of the thread.
    ///
    /// A running thread gets the new priority immediately, an idle one when it next starts.
    ///
    /// # Returns
    ///
    /// `true` if the priority was applied (or stored, for an idle thread). On failure the
    /// previous priority is kept.
    pub fn set_priority(&self, priority: i32) -> bool {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return false;
        }

        let _lifecycle = self.inner.lifecycle.lock();
        let applied = match self.inner.handle.lock().as_ref() {
            Some(handle) => native::set_thread_priority(handle, priority),
            None => true,
        };

        if applied {
            self.inner.priority.store(priority, Ordering::SeqCst);
        }

        applied
    }

    /// The last successfully applied priority.
    pub fn priority(&self) -> i32 {
        self.inner.priority.load(Ordering::SeqCst)
    }

    /// Sets the CPU affinity for the next start. Zero leaves the affinity to the OS.
    ///
    /// A running thread is not affected.
    pub fn set_affinity_mask(&self, mask: u64) {
        self.inner.affinity_mask.store(mask, Ordering::SeqCst);
    }

    /// The CPU affinity that the next start will apply.
    pub fn affinity_mask(&self) -> u64 {
        self.inner.affinity_mask.load(Ordering::SeqCst)
    }

    /// The identity of the native thread, while its entry point runs.
    pub fn thread_id(&self) -> Option<ThreadId> {
        *self.inner.thread_id.lock()
    }

    /// Blocks until [`ThreadRef::notify`] is called or the timeout elapses.
    ///
    /// A zero or negative timeout waits forever.
    ///
    /// # Returns
    ///
    /// `true` if the thread was notified. An abandoned run gets `false` without blocking.
    pub fn wait(&self, timeout_ms: i32) -> bool {
        match &self.run {
            Some(run) => !self.is_abandoned() && run.wake_event.wait(timeout_ms),
            None => self.wake_event().wait(timeout_ms),
        }
    }

    /// Wakes the thread if it is blocked in [`ThreadRef::wait`].
    pub fn notify(&self) {
        self.wake_event().signal();
    }

    fn wake_event(&self) -> Arc<WaitableEvent> {
        Arc::clone(&self.inner.wake_event.lock())
    }

    fn bind(&self, number: u64) -> ThreadRef {
        ThreadRef {
            inner: Arc::clone(&self.inner),
            run: Some(RunBinding {
                number,
                wake_event: self.wake_event(),
            }),
        }
    }

    fn is_abandoned(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| self.inner.active_run.load(Ordering::SeqCst) != run.number)
    }

    fn set_state(&self, state: ThreadState) {
        self.inner.state.store(state as u8, Ordering::SeqCst);
    }

    fn ensure_not_current(&self, operation: &'static str) -> Result<()> {
        if self.thread_id() == Some(thread::current().id()) {
            error!("thread '{}' attempted to {} itself", self.inner.name, operation);
            return Err(Error::SelfJoin { operation });
        }

        Ok(())
    }

    fn owns_run(slot: &Option<NativeHandle>, run: u64) -> bool {
        slot.as_ref().map(NativeHandle::run) == Some(run)
    }

    /// Abandons the native thread and clears its bookkeeping.
    fn force_kill(&self) -> StopOutcome {
        let mut slot = self.inner.handle.lock();
        let Some(handle) = slot.take() else {
            return StopOutcome::Exited;
        };

        error!("killing thread '{}' by force", self.inner.name);

        native::kill(handle);
        self.inner.active_run.store(0, Ordering::SeqCst);
        registry().remove(self);
        *self.inner.thread_id.lock() = None;
        self.set_state(ThreadState::ForceKilled);

        // The abandoned run keeps the old event; waking it lets a cooperative body notice
        let abandoned = mem::replace(
            &mut *self.inner.wake_event.lock(),
            Arc::new(WaitableEvent::default()),
        );
        abandoned.signal();

        StopOutcome::ForceKilled
    }

    /// Runs on the native thread for the lifetime of one run.
    fn entry_point(self, run: u64) {
        {
            let slot = self.inner.handle.lock();
            if !Self::owns_run(&slot, run) {
                debug!("thread '{}' run {} was abandoned before it started", self.inner.name, run);
                return;
            }

            registry().register(self.clone());
            *self.inner.thread_id.lock() = Some(thread::current().id());
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if !self.inner.startup_gate.wait(STARTUP_GATE_TIMEOUT_MS) {
                warn!("thread '{}' was never released by start()", self.inner.name);
                return;
            }

            let mask = self.affinity_mask();
            if mask != 0 && !native::set_current_thread_affinity_mask(mask) {
                warn!("could not apply affinity mask {:#x} to thread '{}'", mask, self.inner.name);
            }

            self.enter_running(run);
            self.inner.body.run(&self);
        }));

        if let Err(payload) = outcome {
            error!("thread '{}' panicked: {}", self.inner.name, panic_message(payload.as_ref()));
        }

        let mut slot = self.inner.handle.lock();
        if !Self::owns_run(&slot, run) {
            debug!("thread '{}' run {} finished after being abandoned", self.inner.name, run);
            return;
        }

        registry().unregister(&self);
        *slot = None;
        self.inner.active_run.store(0, Ordering::SeqCst);
        *self.inner.thread_id.lock() = None;
        self.set_state(ThreadState::Idle);

        debug!("thread '{}' exited (run {})", self.inner.name, run);
    }

    fn enter_running(&self, run: u64) {
        let slot = self.inner.handle.lock();
        if Self::owns_run(&slot, run) {
            let _ = self.inner.state.compare_exchange(
                ThreadState::Starting as u8,
                ThreadState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }
}

impl PartialEq for ThreadRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ThreadRef {}

impl fmt::Debug for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadRef")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("thread_id", &self.thread_id())
            .field("run", &self.run.as_ref().map(|run| run.number))
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// A long-lived worker thread with a cooperative stop protocol.
///
/// Owns the worker described by [`ThreadRef`] and dereferences to it for all lifecycle
/// operations. Dropping a running `ManagedThread` stops it with [`DROP_STOP_TIMEOUT_MS`], which
/// escalates to a forced stop if the body does not return in time.
///
/// # Examples
///
/// ```rust
/// use managed_thread::{ManagedThread, ThreadRef};
///
/// let worker = ManagedThread::builder()
///     .name("collector")
///     .priority(7)
///     .build(|thread: &ThreadRef| {
///         while !thread.thread_should_exit() {
///             thread.wait(-1);
///         }
///     })?;
///
/// worker.start()?;
/// worker.stop(1000)?;
/// # Ok::<(), managed_thread::Error>(())
/// ```
pub struct ManagedThread {
    thread: ThreadRef,
}

impl ManagedThread {
    /// Creates an idle thread named `name` that runs `body` when started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `name` contains a NUL byte.
    pub fn new<B: ThreadBody>(name: impl Into<String>, body: B) -> Result<Self> {
        Builder::new().name(name).build(body)
    }

    /// Returns a [`Builder`] to configure a thread before creating it.
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(super) fn from_parts(
        name: String,
        priority: i32,
        affinity_mask: u64,
        stack_size: Option<usize>,
        body: Box<dyn ThreadBody>,
    ) -> Self {
        let inner = ThreadInner {
            name,
            stack_size,
            body,
            lifecycle: CriticalSection::new(()),
            handle: Mutex::new(None),
            thread_id: Mutex::new(None),
            priority: AtomicI32::new(priority),
            affinity_mask: AtomicU64::new(affinity_mask),
            should_exit: AtomicBool::new(false),
            state: AtomicU8::new(ThreadState::Idle as u8),
            runs: AtomicU64::new(0),
            active_run: AtomicU64::new(0),
            startup_gate: WaitableEvent::default(),
            wake_event: Mutex::new(Arc::new(WaitableEvent::default())),
        };

        ManagedThread {
            thread: ThreadRef {
                inner: Arc::new(inner),
                run: None,
            },
        }
    }

    /// Returns a shared reference to this thread.
    pub fn to_thread_ref(&self) -> ThreadRef {
        self.thread.clone()
    }
}

impl Deref for ManagedThread {
    type Target = ThreadRef;

    fn deref(&self) -> &ThreadRef {
        &self.thread
    }
}

impl fmt::Debug for ManagedThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ManagedThread").field(&self.thread).finish()
    }
}

impl Drop for ManagedThread {
    fn drop(&mut self) {
        if let Err(error) = self.thread.stop(DROP_STOP_TIMEOUT_MS) {
            warn!("could not stop thread '{}' on drop: {}", self.thread.name(), error);
        }
    }
}
