//! Helpers for unit tests that drive real managed threads.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, LazyLock, Once,
    },
    thread::{self, ThreadId},
    time::{Duration, Instant},
};

use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

use crate::{sync::WaitableEvent, ManagedThread, ThreadRef};

/// Creates a thread that is never started.
pub fn idle_thread(name: &str) -> ManagedThread {
    ManagedThread::new(name, |_: &ThreadRef| {}).unwrap()
}

/// Polls `condition` every millisecond until it holds, for at most `timeout_ms`.
pub fn wait_until(timeout_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    while !condition() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }

    true
}

/// A `log` backend keeping every record in memory.
#[derive(Default)]
pub struct LogCapture {
    records: Mutex<Vec<(Level, String)>>,
}

impl LogCapture {
    /// Returns `true` if a record at `level` containing `needle` was logged.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|(recorded, message)| *recorded == level && message.contains(needle))
    }
}

impl Log for LogCapture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOG_CAPTURE: LazyLock<LogCapture> = LazyLock::new(LogCapture::default);

/// Installs the capturing logger for the test process on first use and returns it.
pub fn captured_logs() -> &'static LogCapture {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if log::set_logger(&*LOG_CAPTURE).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });

    &LOG_CAPTURE
}

/// Records what a thread body observed each time it was entered.
#[derive(Default)]
pub struct Tracker {
    entries: AtomicUsize,
    observed_id: Mutex<Option<ThreadId>>,
    entered: WaitableEvent,
}

impl Tracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Tracker::default())
    }

    /// Called from a body; counts the entry and remembers the calling thread.
    pub fn enter(&self) {
        *self.observed_id.lock() = Some(thread::current().id());
        self.entries.fetch_add(1, Ordering::SeqCst);
        self.entered.signal();
    }

    /// Waits up to five seconds for the next entry.
    pub fn wait_entered(&self) -> bool {
        self.wait_entered_within(5000)
    }

    pub fn wait_entered_within(&self, timeout_ms: i32) -> bool {
        self.entered.wait(timeout_ms)
    }

    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::SeqCst)
    }

    pub fn observed_id(&self) -> Option<ThreadId> {
        *self.observed_id.lock()
    }

    /// A body that sleeps until notified and returns once asked to.
    pub fn cooperative(self: &Arc<Self>) -> impl Fn(&ThreadRef) + Send + Sync + 'static {
        let tracker = Arc::clone(self);
        move |thread: &ThreadRef| {
            tracker.enter();
            while !thread.thread_should_exit() {
                thread.wait(-1);
            }
        }
    }

    /// A body that ignores stop requests until `release` is set.
    pub fn stubborn(
        self: &Arc<Self>,
        release: Arc<AtomicBool>,
    ) -> impl Fn(&ThreadRef) + Send + Sync + 'static {
        let tracker = Arc::clone(self);
        move |_: &ThreadRef| {
            tracker.enter();
            while !release.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }
}
