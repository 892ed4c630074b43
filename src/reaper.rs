//! The child reaper (spec.md §4.4).
//!
//! The real `SIGCHLD` handler does only one thing — set a flag — because
//! a signal handler must stay async-signal-safe: no locking, no
//! `waitpid`. The actual non-blocking drain (`waitpid(-1,
//! WNOHANG|WUNTRACED|WCONTINUED)`) runs as ordinary code in
//! `drain_pending`, called only from `SignalMaskGuard::block` and
//! `unblock_and_wait` — both of which run with `SIGCHLD` blocked, so the
//! drain never races the handler for the job table's lock.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use crate::job::{JobTable, ProcessState};

static CHLD_PENDING: AtomicBool = AtomicBool::new(false);
static TABLE: OnceLock<Mutex<JobTable>> = OnceLock::new();

/// The process-wide job table. There is exactly one, mirroring the
/// single static job array a C job-control shell keeps.
pub fn table() -> &'static Mutex<JobTable> {
    TABLE.get_or_init(|| Mutex::new(JobTable::new()))
}

pub fn install() -> io::Result<()> {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = handle_sigchld as usize;
    action.sa_flags = libc::SA_RESTART;
    unsafe {
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGCHLD, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

extern "C" fn handle_sigchld(_signal: libc::c_int) {
    CHLD_PENDING.store(true, Ordering::Relaxed);
}

/// Drains every child that `waitpid` can report without blocking,
/// updating process and job state in the table. No-op if the handler
/// hasn't flagged anything since the last drain.
pub fn drain_pending() {
    if !CHLD_PENDING.swap(false, Ordering::Relaxed) {
        return;
    }

    let mut table = table().lock().unwrap();
    loop {
        let mut raw_status: libc::c_int = 0;
        let pid = unsafe {
            libc::waitpid(
                -1,
                &mut raw_status,
                libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED,
            )
        };

        if pid <= 0 {
            break;
        }

        let Some(process) = table.find_process_mut(pid) else {
            continue;
        };

        if unsafe { libc::WIFSTOPPED(raw_status) } {
            process.state = ProcessState::Stopped;
        } else if unsafe { libc::WIFCONTINUED(raw_status) } {
            process.state = ProcessState::Running;
        } else {
            process.state = ProcessState::Finished;
            process.raw_status = Some(raw_status);
        }
    }
}
