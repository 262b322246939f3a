//! Platform binding for native threads.
//!
//! Everything operating-system specific lives here: creating the OS thread, giving it up on a
//! forced stop, and the best-effort priority, affinity and name calls. The rest of the crate
//! only sees [`NativeHandle`] and `bool` results.
//!
//! Priorities and affinity are implemented through `libc` on Unix (affinity and thread names on
//! Linux only). On other platforms these calls report failure and the lifecycle carries on
//! without them.

use std::{
    io,
    thread::{self, JoinHandle},
};

use log::debug;

#[cfg(unix)]
use super::{MAX_PRIORITY, MIN_PRIORITY};

/// Owned handle of a running native thread.
///
/// Each handle remembers the run it was spawned for, so that the worker can tell whether the
/// handle stored in its [`crate::ManagedThread`] is still its own when it cleans up.
#[derive(Debug)]
pub(crate) struct NativeHandle {
    join: JoinHandle<()>,
    run: u64,
}

impl NativeHandle {
    /// The run number this native thread was spawned for.
    pub(crate) fn run(&self) -> u64 {
        self.run
    }
}

/// Creates a native thread executing `entry`.
///
/// The name is applied to the OS thread when non-empty.
///
/// # Errors
///
/// Returns the I/O error reported by the operating system if the thread could not be created.
pub(crate) fn spawn<F>(
    name: &str,
    stack_size: Option<usize>,
    run: u64,
    entry: F,
) -> io::Result<NativeHandle>
where
    F: FnOnce() + Send + 'static,
{
    let mut builder = thread::Builder::new();
    if !name.is_empty() {
        builder = builder.name(name.to_string());
    }
    if let Some(size) = stack_size {
        builder = builder.stack_size(size);
    }

    let join = builder.spawn(entry)?;
    Ok(NativeHandle { join, run })
}

/// Gives up a native thread that did not stop in time.
///
/// Rust offers no way to terminate another thread without tearing down the process, so the
/// thread is detached: it keeps running until its body returns, but it is no longer associated
/// with any managed thread and its own cleanup is skipped.
pub(crate) fn kill(handle: NativeHandle) {
    debug!("detaching native thread of run {}", handle.run);
    drop(handle.join);
}

/// Applies `priority` to the thread behind `handle`.
pub(crate) fn set_thread_priority(handle: &NativeHandle, priority: i32) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::thread::JoinHandleExt;

        apply_priority(handle.join.as_pthread_t() as libc::pthread_t, priority)
    }

    #[cfg(not(unix))]
    {
        let _ = (handle, priority);
        false
    }
}

/// Applies `priority` to the calling thread.
pub(crate) fn set_current_thread_priority(priority: i32) -> bool {
    #[cfg(unix)]
    {
        // SAFETY: pthread_self has no preconditions.
        apply_priority(unsafe { libc::pthread_self() }, priority)
    }

    #[cfg(not(unix))]
    {
        let _ = priority;
        false
    }
}

/// Maps `priority` linearly onto the priority range of the thread's current scheduling policy.
#[cfg(unix)]
fn apply_priority(thread: libc::pthread_t, priority: i32) -> bool {
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return false;
    }

    // SAFETY: `thread` is either the calling thread or a joinable thread whose handle is held
    // by the caller, so it has not been reclaimed. `param` and `policy` are valid out-pointers.
    unsafe {
        let mut policy: libc::c_int = 0;
        let mut param: libc::sched_param = std::mem::zeroed();
        if libc::pthread_getschedparam(thread, &mut policy, &mut param) != 0 {
            return false;
        }

        let min = libc::sched_get_priority_min(policy);
        let max = libc::sched_get_priority_max(policy);
        if min < 0 || max < min {
            return false;
        }

        param.sched_priority =
            min + (max - min) * (priority - MIN_PRIORITY) / (MAX_PRIORITY - MIN_PRIORITY);
        libc::pthread_setschedparam(thread, policy, &param) == 0
    }
}

/// Restricts the calling thread to the CPUs set in `mask` (bit `n` is CPU `n`).
pub(crate) fn set_current_thread_affinity_mask(mask: u64) -> bool {
    #[cfg(target_os = "linux")]
    {
        if mask == 0 {
            return false;
        }

        // SAFETY: `set` is a zero-initialized cpu_set_t owned by this frame, all CPU indices are
        // below 64 and therefore within CPU_SETSIZE, and pid 0 addresses the calling thread.
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            for cpu in 0..u64::BITS as usize {
                if mask & (1u64 << cpu) != 0 {
                    libc::CPU_SET(cpu, &mut set);
                }
            }

            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) == 0
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = mask;
        false
    }
}

/// Returns the CPUs the calling thread may run on, limited to the first 64.
#[cfg(all(test, target_os = "linux"))]
pub(crate) fn current_thread_affinity_mask() -> u64 {
    // SAFETY: `set` is a valid out-pointer of the size passed in.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        if libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut set) != 0 {
            return 0;
        }

        (0..u64::BITS as usize)
            .filter(|cpu| libc::CPU_ISSET(*cpu, &set))
            .fold(0u64, |mask, cpu| mask | (1u64 << cpu))
    }
}

/// Sets the OS-level name of the calling thread.
///
/// Linux limits names to 15 bytes; longer names are truncated on a character boundary.
pub(crate) fn set_current_thread_name(name: &str) -> bool {
    #[cfg(target_os = "linux")]
    {
        const MAX_NAME_LEN: usize = 15;

        let mut end = name.len().min(MAX_NAME_LEN);
        while !name.is_char_boundary(end) {
            end -= 1;
        }

        let Ok(name) = std::ffi::CString::new(&name[..end]) else {
            return false;
        };

        // SAFETY: `name` is a valid NUL-terminated string of at most 16 bytes.
        unsafe { libc::pthread_setname_np(libc::pthread_self(), name.as_ptr()) == 0 }
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = name;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{DEFAULT_PRIORITY, MAX_PRIORITY};
    use std::sync::mpsc;

    #[test]
    fn test_spawn_applies_name() {
        let (tx, rx) = mpsc::channel();
        let handle = spawn("native-test", None, 1, move || {
            tx.send(thread::current().name().map(str::to_string)).unwrap();
        })
        .unwrap();

        assert_eq!(handle.run(), 1);
        assert_eq!(rx.recv().unwrap().as_deref(), Some("native-test"));
        handle.join.join().unwrap();
    }

    #[test]
    fn test_spawn_without_name() {
        let (tx, rx) = mpsc::channel();
        let handle = spawn("", Some(256 * 1024), 2, move || {
            tx.send(thread::current().name().is_none()).unwrap();
        })
        .unwrap();

        assert!(rx.recv().unwrap());
        handle.join.join().unwrap();
    }

    #[test]
    fn test_priority_out_of_range_rejected() {
        assert!(!set_current_thread_priority(MAX_PRIORITY + 1));
        assert!(!set_current_thread_priority(-1));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_priority_on_default_policy() {
        // SCHED_OTHER has a single static priority, so every valid level maps onto it.
        assert!(set_current_thread_priority(DEFAULT_PRIORITY));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_affinity_mask_applied() {
        let (tx, rx) = mpsc::channel();
        let handle = spawn("", None, 3, move || {
            let available = current_thread_affinity_mask();
            let lowest = available & available.wrapping_neg();
            let applied = set_current_thread_affinity_mask(lowest);
            tx.send((lowest, applied, current_thread_affinity_mask())).unwrap();
        })
        .unwrap();

        let (lowest, applied, observed) = rx.recv().unwrap();
        assert!(applied);
        assert_eq!(observed, lowest);
        handle.join.join().unwrap();
    }

    #[test]
    fn test_affinity_mask_zero_rejected() {
        assert!(!set_current_thread_affinity_mask(0));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_current_thread_name() {
        let handle = spawn("", None, 4, || {
            assert!(set_current_thread_name("a-rather-long-worker-name"));
            assert!(!set_current_thread_name("bad\0name"));
        })
        .unwrap();

        handle.join.join().unwrap();
    }
}
